use gpsbus::*;
use gpsbus::protocol::*;
use gpsbus::state::Position;

type TestApp = GpsApp<SimulatedGpsReceiver, LoopbackBus, ManualClock>;

fn test_fix() -> GpsFix {
    GpsFix {
        position: Position {
            latitude: 1.0,
            longitude: 2.0,
            altitude: 3.0,
        },
        satellites: 7,
    }
}

fn create_test_app() -> TestApp {
    let mut app = GpsApp::new(
        AppConfig::default(),
        SimulatedGpsReceiver::stationary(test_fix()),
        LoopbackBus::default(),
        ManualClock::new(1_000),
    );
    app.init();
    app
}

#[test]
fn test_app_starts_zeroed() {
    let app = create_test_app();

    assert_eq!(*app.state(), TelemetryState::default());
    assert_eq!(app.run_status(), RunStatus::Run);
    assert_eq!(app.diagnostics().count_of(EventId::Startup), 1);
}

#[test]
fn test_noop_increments_command_counter() {
    let mut app = create_test_app();

    let result = app.process_message(&InboundMessage::noop());
    assert_eq!(result, Ok(Handled::Noop));
    assert_eq!(app.state().command_counter, 1);
    assert_eq!(app.state().error_counter, 0);

    let last = app.diagnostics().last().unwrap();
    assert_eq!(last.event_id, EventId::NoopCommand);
    assert_eq!(last.severity, Severity::Information);
    assert!(last.message.contains("NOOP"));
}

#[test]
fn test_noop_counter_wraps_mod_256() {
    let mut app = create_test_app();

    for n in 1..=300u32 {
        app.process_message(&InboundMessage::noop()).unwrap();
        assert_eq!(u32::from(app.state().command_counter), n % 256);
    }
    assert_eq!(app.state().error_counter, 0);
}

#[test]
fn test_reset_counters_zeroes_both() {
    let mut app = create_test_app();

    for _ in 0..5 {
        app.process_message(&InboundMessage::noop()).unwrap();
    }
    for _ in 0..3 {
        let _ = app.process_message(&InboundMessage::ground_command(42));
    }
    assert_eq!(app.state().command_counter, 5);
    assert_eq!(app.state().error_counter, 3);

    let result = app.process_message(&InboundMessage::reset_counters());
    assert_eq!(result, Ok(Handled::CountersReset));
    assert_eq!(app.state().command_counter, 0);
    assert_eq!(app.state().error_counter, 0);
    assert_eq!(app.diagnostics().last().unwrap().event_id, EventId::ResetCommand);
}

#[test]
fn test_reset_leaves_position_and_sequence() {
    let mut app = create_test_app();

    app.process_message(&InboundMessage::trigger(GPS_APP_READ_MID)).unwrap();
    app.process_message(&InboundMessage::trigger(GPS_APP_SEND_RF_MID)).unwrap();
    let before = *app.state();

    app.process_message(&InboundMessage::reset_counters()).unwrap();

    assert_eq!(app.state().position, before.position);
    assert_eq!(app.state().satellite_count, before.satellite_count);
    assert_eq!(app.state().rf_sequence_counter, before.rf_sequence_counter);
}

#[test]
fn test_noop_unknown_code_reset_sequence() {
    let mut app = create_test_app();

    app.process_message(&InboundMessage::noop()).unwrap();
    let unknown = app.process_message(&InboundMessage::ground_command(9));
    assert_eq!(
        unknown,
        Err(GpsError::UnknownCommand {
            msg_id: GPS_APP_CMD_MID,
            command_code: 9
        })
    );
    assert_eq!(app.state().command_counter, 1);
    assert_eq!(app.state().error_counter, 1);

    app.process_message(&InboundMessage::reset_counters()).unwrap();
    assert_eq!(app.state().command_counter, 0);
    assert_eq!(app.state().error_counter, 0);
}

#[test]
fn test_unknown_command_code_event() {
    let mut app = create_test_app();

    let _ = app.process_message(&InboundMessage::ground_command(200));

    let last = app.diagnostics().last().unwrap();
    assert_eq!(last.event_id, EventId::CommandError);
    assert_eq!(last.severity, Severity::Error);
    assert!(last.message.contains("CC = 200"));
}

#[test]
fn test_unknown_message_id_only_counts_error() {
    let mut app = create_test_app();
    app.process_message(&InboundMessage::trigger(GPS_APP_READ_MID)).unwrap();
    let before = *app.state();

    let result = app.process_message(&InboundMessage::new(0x1999, 0, NO_ARGS_CMD_LEN));
    assert_eq!(result, Err(GpsError::UnknownMessage { msg_id: 0x1999 }));

    let expected = TelemetryState {
        error_counter: before.error_counter + 1,
        ..before
    };
    assert_eq!(*app.state(), expected);

    let last = app.diagnostics().last().unwrap();
    assert_eq!(last.event_id, EventId::InvalidMsgId);
    assert!(last.message.contains("0x1999"));
    assert!(app.transport().transmitted().is_empty());
}

#[test]
fn test_length_mismatch_blocks_handler() {
    let mut app = create_test_app();

    for bad_length in [0usize, 7, 9, 64] {
        let before = *app.state();
        let message = InboundMessage::new(GPS_APP_CMD_MID, CommandCode::Noop as u8, bad_length);

        let result = app.process_message(&message);
        assert_eq!(
            result,
            Err(GpsError::LengthMismatch {
                msg_id: GPS_APP_CMD_MID,
                command_code: 0,
                actual: bad_length,
                expected: NO_ARGS_CMD_LEN,
            })
        );
        assert_eq!(app.state().command_counter, before.command_counter);
        assert_eq!(app.state().error_counter, before.error_counter + 1);
    }
}

#[test]
fn test_length_mismatch_event_carries_details() {
    let mut app = create_test_app();

    let message = InboundMessage::new(GPS_APP_CMD_MID, CommandCode::ResetCounters as u8, 12);
    let _ = app.process_message(&message);

    let last = app.diagnostics().last().unwrap();
    assert_eq!(last.event_id, EventId::LengthError);
    assert!(last.message.contains("ID = 0x18C0"));
    assert!(last.message.contains("CC = 1"));
    assert!(last.message.contains("Len = 12"));
    assert!(last.message.contains("Expected = 8"));
}

#[test]
fn test_length_mismatch_on_reset_keeps_counters() {
    let mut app = create_test_app();
    app.process_message(&InboundMessage::noop()).unwrap();

    let message = InboundMessage::new(GPS_APP_CMD_MID, CommandCode::ResetCounters as u8, 10);
    assert!(app.process_message(&message).is_err());

    assert_eq!(app.state().command_counter, 1);
    assert_eq!(app.state().error_counter, 1);
}

#[test]
fn test_trigger_length_checked() {
    let mut app = create_test_app();

    let message = InboundMessage::new(GPS_APP_SEND_HK_MID, 0, 20);
    assert!(matches!(
        app.process_message(&message),
        Err(GpsError::LengthMismatch { expected: 8, actual: 20, .. })
    ));
    assert!(app.transport().transmitted().is_empty());
    assert_eq!(app.state().error_counter, 1);
}

#[test]
fn test_triggers_do_not_touch_command_counter() {
    let mut app = create_test_app();

    app.process_message(&InboundMessage::trigger(GPS_APP_READ_MID)).unwrap();
    app.process_message(&InboundMessage::trigger(GPS_APP_SEND_HK_MID)).unwrap();
    app.process_message(&InboundMessage::trigger(GPS_APP_SEND_RF_MID)).unwrap();

    assert_eq!(app.state().command_counter, 0);
    assert_eq!(app.state().error_counter, 0);
    assert_eq!(app.transport().transmitted().len(), 2);
}

#[test]
fn test_custom_message_ids_from_config() {
    let config = AppConfig {
        cmd_mid: 0x1900,
        ..AppConfig::default()
    };
    let mut app = GpsApp::new(
        config,
        SimulatedGpsReceiver::new(),
        LoopbackBus::default(),
        ManualClock::new(0),
    );

    assert!(app.process_message(&InboundMessage::new(0x1900, 0, 8)).is_ok());
    assert_eq!(
        app.process_message(&InboundMessage::noop()),
        Err(GpsError::UnknownMessage { msg_id: GPS_APP_CMD_MID })
    );
}

#[test]
fn test_run_drains_pipe() {
    let mut app = create_test_app();

    {
        let bus = app.transport_mut();
        bus.send(InboundMessage::noop()).unwrap();
        bus.send(InboundMessage::ground_command(77)).unwrap();
        bus.send(InboundMessage::trigger(GPS_APP_READ_MID)).unwrap();
        bus.send(InboundMessage::trigger(GPS_APP_SEND_HK_MID)).unwrap();
    }

    assert_eq!(app.run(), RunStatus::Run);
    assert_eq!(app.transport().pending(), 0);
    assert_eq!(app.state().command_counter, 1);
    assert_eq!(app.state().error_counter, 1);
    assert_eq!(app.transport().transmitted().len(), 1);
}

#[test]
fn test_pipe_error_stops_run_loop() {
    let mut app = create_test_app();
    app.transport_mut().send(InboundMessage::noop()).unwrap();
    app.transport_mut().close();

    assert_eq!(app.run(), RunStatus::Error);
    assert_eq!(app.state().command_counter, 1);
    assert_eq!(app.diagnostics().count_of(EventId::PipeError), 1);
}

#[test]
fn test_pipe_depth_enforced() {
    let mut bus = LoopbackBus::new(2);
    assert!(bus.send(InboundMessage::noop()).is_ok());
    assert!(bus.send(InboundMessage::noop()).is_ok());
    assert_eq!(bus.send(InboundMessage::noop()), Err(TransportError::PipeFull));
}

#[test]
fn test_resolve_message_kinds() {
    let config = AppConfig::default();

    assert_eq!(
        MessageKind::resolve(&config, &InboundMessage::noop()),
        Ok(MessageKind::GroundCommand(CommandCode::Noop))
    );
    assert_eq!(
        MessageKind::resolve(&config, &InboundMessage::trigger(GPS_APP_SEND_RF_MID)),
        Ok(MessageKind::SendRfTelemetry)
    );
    assert_eq!(
        MessageKind::resolve(&config, &InboundMessage::trigger(GPS_APP_HK_TLM_MID)),
        Err(GpsError::UnknownMessage { msg_id: GPS_APP_HK_TLM_MID })
    );
}

#[test]
fn test_inbound_message_json_defaults() {
    let message: InboundMessage = serde_json::from_str(r#"{"msg_id":6336}"#).unwrap();
    assert_eq!(message, InboundMessage::noop());
}

#[test]
fn test_bus_sized_from_config_depth() {
    let config = AppConfig::from_json_str(r#"{"pipe_depth": 2}"#).unwrap();
    let mut bus = LoopbackBus::from_config(&config);

    assert_eq!(bus.depth(), 2);
    assert!(bus.send(InboundMessage::noop()).is_ok());
    assert!(bus.send(InboundMessage::noop()).is_ok());
    assert_eq!(bus.send(InboundMessage::noop()), Err(TransportError::PipeFull));
}

#[test]
fn test_startup_event_names_pipe_and_device() {
    let config = AppConfig {
        pipe_name: "GPS_TEST_PIPE".into(),
        pipe_depth: 4,
        sensor_device: "/dev/i2c-7".into(),
        ..AppConfig::default()
    };
    let bus = LoopbackBus::from_config(&config);
    let mut app = GpsApp::new(config, SimulatedGpsReceiver::new(), bus, ManualClock::new(0));
    app.init();

    let last = app.diagnostics().last().unwrap();
    assert_eq!(last.event_id, EventId::Startup);
    assert!(last.message.contains("GPS_TEST_PIPE"));
    assert!(last.message.contains("depth 4"));
    assert!(last.message.contains("/dev/i2c-7"));
}

#[test]
fn test_dispatch_next_reports_each_outcome() {
    let mut app = create_test_app();
    {
        let bus = app.transport_mut();
        bus.send(InboundMessage::noop()).unwrap();
        bus.send(InboundMessage::ground_command(12)).unwrap();
    }

    let first = app.dispatch_next().unwrap().unwrap();
    assert_eq!(first.message, InboundMessage::noop());
    assert_eq!(first.outcome, Ok(Handled::Noop));

    let second = app.dispatch_next().unwrap().unwrap();
    assert_eq!(
        second.outcome,
        Err(GpsError::UnknownCommand {
            msg_id: GPS_APP_CMD_MID,
            command_code: 12
        })
    );

    assert_eq!(app.dispatch_next(), Ok(None));
    assert_eq!(app.run_once(), Ok(false));
}

#[test]
fn test_dispatch_next_pipe_failure() {
    let mut app = create_test_app();
    app.transport_mut().close();

    assert_eq!(app.dispatch_next(), Err(TransportError::PipeClosed));
    assert_eq!(app.run_status(), RunStatus::Error);
    assert_eq!(app.diagnostics().last().unwrap().event_id, EventId::PipeError);
}

/// Sensor that counts polls and always answers with the same block.
struct CountingSensor {
    polls: usize,
}

impl SensorInterface for CountingSensor {
    fn read_bytes(&mut self, block: &mut gpsbus::subsystems::SensorBlock) -> nb::Result<(), SensorFault> {
        self.polls += 1;
        *block = test_fix().encode();
        Ok(())
    }
}

#[test]
fn test_bad_length_rf_trigger_keeps_sequence() {
    let mut app = create_test_app();
    app.report_rf_telemetry().unwrap();
    let sent = app.transport().transmitted().len();

    for bad_length in [0usize, 7, 9, 32] {
        let message = InboundMessage::new(GPS_APP_SEND_RF_MID, 0, bad_length);
        assert!(matches!(
            app.process_message(&message),
            Err(GpsError::LengthMismatch { expected: 8, .. })
        ));
    }

    assert_eq!(app.state().rf_sequence_counter, 1);
    assert_eq!(app.state().error_counter, 4);
    assert_eq!(app.transport().transmitted().len(), sent);
}

#[test]
fn test_bad_length_read_trigger_never_polls_sensor() {
    let mut app = GpsApp::new(
        AppConfig::default(),
        CountingSensor { polls: 0 },
        LoopbackBus::default(),
        ManualClock::new(0),
    );

    let message = InboundMessage::new(GPS_APP_READ_MID, 0, 14);
    assert!(matches!(
        app.process_message(&message),
        Err(GpsError::LengthMismatch { actual: 14, expected: 8, .. })
    ));
    assert_eq!(app.sensor_mut().polls, 0);
    assert_eq!(app.state().position, Position::default());
    assert_eq!(app.state().error_counter, 1);

    app.process_message(&InboundMessage::trigger(GPS_APP_READ_MID)).unwrap();
    assert_eq!(app.sensor_mut().polls, 1);
}
