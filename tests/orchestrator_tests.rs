use std::sync::Arc;
use std::time::Duration;

use racevisor::{
    API_ROOT, ActionClass, Event, HistoryStorage, LocalTransceiver, LocalTransport,
    MemoryHistoryStorage, Orchestrator, OrchestratorConfig, OrchestratorState, OptionMap,
    PolicyParams, RestRequest, Runtime, Transceiver,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn config(params: PolicyParams) -> OrchestratorConfig {
    OrchestratorConfig {
        explore_policy: "random".into(),
        explore_policy_param: params,
        channel_capacity: 64,
        ..OrchestratorConfig::default()
    }
}

async fn local(cfg: OrchestratorConfig) -> (Orchestrator, LocalTransceiver) {
    let (transport, inspector) = LocalTransport::pair(64);
    let orc = Runtime::new()
        .orchestrator(cfg)
        .with_transport(transport)
        .build()
        .await
        .unwrap();
    orc.start().await.unwrap();
    inspector.start().await.unwrap();
    (orc, inspector)
}

async fn answer(inspector: &LocalTransceiver, event: Event) -> ActionClass {
    let slot = inspector.send_event(event).await.unwrap().unwrap();
    timeout(WAIT, slot).await.unwrap().unwrap().class()
}

#[tokio::test]
async fn test_disabled_orchestrator_accepts_everything() {
    let mut cfg = config(PolicyParams::new().with("faultActionProbability", 1.0));
    cfg.start_enabled = false;
    let (orc, inspector) = local(cfg).await;
    assert!(!orc.is_enabled());

    for _ in 0..5 {
        let ev = Event::packet("n1", "n1", "n2", OptionMap::new());
        assert_eq!(answer(&inspector, ev).await, ActionClass::EventAcceptance);
    }

    orc.enable();
    let ev = Event::packet("n1", "n1", "n2", OptionMap::new());
    assert_eq!(answer(&inspector, ev).await, ActionClass::PacketFault);

    let trace = orc.shutdown().await.unwrap();
    assert_eq!(trace.len(), 6);
    assert_eq!(inspector.pending(), 0);
}

#[tokio::test]
async fn test_shell_actions_are_traced_not_forwarded() {
    let cfg = config(
        PolicyParams::new()
            .with("shellActionInterval", "10ms")
            .with("shellActionCommand", "true"),
    );
    let (orc, inspector) = local(cfg).await;
    let mut unsolicited = inspector.unsolicited().unwrap();

    let ev = Event::packet("n1", "n1", "n2", OptionMap::new());
    assert_eq!(answer(&inspector, ev).await, ActionClass::EventAcceptance);

    timeout(WAIT, async {
        while !orc
            .trace()
            .actions()
            .iter()
            .any(|a| a.class() == ActionClass::Shell)
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let trace = orc.shutdown().await.unwrap();
    assert!(trace.actions().iter().any(|a| a.class() == ActionClass::Shell));
    assert!(unsolicited.try_recv().is_err());
}

#[tokio::test]
async fn test_non_deferred_events_are_answered_on_the_orchestrator() {
    let (orc, inspector) = local(config(PolicyParams::new())).await;
    assert!(inspector.send_event(Event::log("n1", "hello")).await.unwrap().is_none());

    timeout(WAIT, async {
        while orc.trace().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    let trace = orc.shutdown().await.unwrap();
    let nop = &trace.actions()[0];
    assert_eq!(nop.class(), ActionClass::Nop);
    assert!(nop.triggered_time().is_some());
}

#[tokio::test]
async fn test_lifecycle_is_enforced() {
    let orc = Runtime::new()
        .orchestrator(config(PolicyParams::new()))
        .build()
        .await
        .unwrap();
    assert_eq!(orc.state(), OrchestratorState::Created);
    assert_eq!(
        orc.shutdown().await.err().map(|e| e.as_label()),
        Some("orchestrator_invalid_state")
    );

    orc.start().await.unwrap();
    assert_eq!(orc.state(), OrchestratorState::Running);
    assert_eq!(
        orc.start().await.err().map(|e| e.as_label()),
        Some("orchestrator_invalid_state")
    );

    assert!(orc.shutdown().await.unwrap().is_empty());
    assert_eq!(orc.state(), OrchestratorState::Stopped);
}

#[tokio::test]
async fn test_unknown_policy_fails_build() {
    let cfg = OrchestratorConfig {
        explore_policy: "nope".into(),
        ..OrchestratorConfig::default()
    };
    let err = Runtime::new().orchestrator(cfg).build().await.err().unwrap();
    assert_eq!(err.as_label(), "orchestrator_config");
}

#[tokio::test]
async fn test_trace_is_recorded_into_history() {
    let history = Arc::new(MemoryHistoryStorage::new());
    let (transport, inspector) = LocalTransport::pair(64);
    let orc = Runtime::new()
        .orchestrator(config(PolicyParams::new()))
        .with_transport(transport)
        .with_history(history.clone())
        .build()
        .await
        .unwrap();
    orc.start().await.unwrap();
    inspector.start().await.unwrap();

    for _ in 0..2 {
        let ev = Event::packet("n1", "n1", "n2", OptionMap::new());
        assert_eq!(answer(&inspector, ev).await, ActionClass::EventAcceptance);
    }
    let trace = orc.shutdown().await.unwrap();

    assert_eq!(history.nr_stored_histories(), 1);
    let stored = history.get_stored_history(0).unwrap();
    assert_eq!(stored.len(), trace.len());
    assert_eq!(history.search(trace.actions()), vec![0]);
    assert_eq!(history.is_successful(0).unwrap(), None);

    history.record_result(true, Duration::from_secs(3)).unwrap();
    assert_eq!(history.is_successful(0).unwrap(), Some(true));
    assert_eq!(history.required_time(0).unwrap(), Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn test_trace_collection_can_be_turned_off() {
    let mut cfg = config(PolicyParams::new());
    cfg.collect_trace = false;
    let (orc, inspector) = local(cfg).await;
    let ev = Event::packet("n1", "n1", "n2", OptionMap::new());
    assert_eq!(answer(&inspector, ev).await, ActionClass::EventAcceptance);
    assert!(orc.shutdown().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rest_control_toggles_orchestration() {
    let mut cfg = config(PolicyParams::new());
    cfg.rest_enabled = true;
    let orc = Runtime::new().orchestrator(cfg).build().await.unwrap();
    orc.start().await.unwrap();
    let rest = orc.rest().unwrap();
    assert!(orc.is_enabled());

    let disable = format!("{API_ROOT}/control?op=disableOrchestration");
    assert!(rest.handle(RestRequest::post(&disable, Vec::new())).await.is_success());
    timeout(WAIT, async {
        while orc.is_enabled() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let enable = format!("{API_ROOT}/control?op=enableOrchestration");
    assert!(rest.handle(RestRequest::post(&enable, Vec::new())).await.is_success());
    timeout(WAIT, async {
        while !orc.is_enabled() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    orc.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_with_a_stalled_inspector() {
    let cfg = OrchestratorConfig {
        explore_policy: "dumb".into(),
        explore_policy_param: PolicyParams::new(),
        channel_capacity: 1,
        ..OrchestratorConfig::default()
    };
    let (transport, inspector) = LocalTransport::pair(1);
    let orc = Runtime::new()
        .orchestrator(cfg)
        .with_transport(transport)
        .build()
        .await
        .unwrap();
    orc.start().await.unwrap();

    // Never started: nothing drains the inspector's action channel.
    let inspector = Arc::new(inspector);
    let feeder = {
        let inspector = Arc::clone(&inspector);
        tokio::spawn(async move {
            for _ in 0..20 {
                let ev = Event::packet("n1", "n1", "n2", OptionMap::new());
                if inspector.send_event(ev).await.is_err() {
                    break;
                }
            }
        })
    };

    timeout(WAIT, async {
        while orc.trace().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(orc.trace().len() < 20);

    let trace = timeout(WAIT, orc.shutdown()).await.unwrap().unwrap();
    assert!(!trace.is_empty());
    feeder.abort();
}
