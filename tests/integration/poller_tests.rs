//! SensorPoller integration tests.
//!
//! Drives the full poll FSM through [`MockBus`]/[`MockTimer`] one tick at a
//! time, completing transfers by hand, and finally runs it end to end
//! against the simulated TC74.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tc74mon::adapters::blocking_bus::BlockingBus;
use tc74mon::adapters::sim_tc74::SimTc74;
use tc74mon::adapters::threaded_bus::ThreadedBus;
use tc74mon::adapters::time::StdTimer;
use tc74mon::app::events::PollEvent;
use tc74mon::app::ports::{IoIntent, StatusIndicator, TimerError, TransferPort};
use tc74mon::app::service::SensorPoller;
use tc74mon::config::PollerConfig;
use tc74mon::drivers::status_led::{PinIndicator, SimPin};
use tc74mon::error::Fault;
use tc74mon::fsm::StateId;

use crate::mock_hw::{
    capture_errors, error_lines, poller, poller_with, Issued, MockBus, MockTimer, RecordingSink,
    TestPoller,
};

const ADDR: u8 = 0x48;

// ── Helpers ───────────────────────────────────────────────────

/// Init → OpenChannel → ProbeDevice (ACK) → QueryStatus.
fn bring_up(p: &mut TestPoller, sink: &mut RecordingSink) {
    p.tick(sink);
    assert_eq!(p.state(), StateId::OpenChannel);
    p.tick(sink);
    assert_eq!(p.state(), StateId::ProbeDevice);
    p.bus().complete_ok(&[0x00]);
    p.tick(sink);
    assert_eq!(p.state(), StateId::QueryStatus);
}

/// Issue the RWCR query and answer it with `status`.
fn answer_status(p: &mut TestPoller, sink: &mut RecordingSink, status: u8) {
    assert_eq!(p.state(), StateId::QueryStatus);
    p.tick(sink);
    assert_eq!(p.state(), StateId::QueryStatusRead);
    p.bus().complete_ok(&[status]);
    p.tick(sink);
}

/// Issue the RTR query and answer it with `raw`.
fn answer_temperature(p: &mut TestPoller, sink: &mut RecordingSink, raw: u8) {
    assert_eq!(p.state(), StateId::QueryTemperature);
    p.tick(sink);
    assert_eq!(p.state(), StateId::QueryTemperatureRead);
    p.bus().complete_ok(&[raw]);
    p.tick(sink);
}

/// Pause → PauseWait → (expire) → QueryStatus.
fn finish_pause(p: &mut TestPoller, sink: &mut RecordingSink) {
    assert_eq!(p.state(), StateId::Pause);
    p.tick(sink);
    assert_eq!(p.state(), StateId::PauseWait);
    p.timer_mut().expire_all();
    p.tick(sink);
    assert_eq!(p.state(), StateId::QueryStatus);
}

// ── Bring-up ──────────────────────────────────────────────────

#[test]
fn initialize_parks_in_init_without_io() {
    let p = poller();
    assert_eq!(p.state(), StateId::Init);
    assert!(p.bus().issued.is_empty());
    assert!(p.bus().opened.is_empty());
    assert!(p.timer().heartbeat.is_none());
    assert_eq!(p.sample_count(), 0);
    assert!(p.fault().is_none());
}

#[test]
fn init_registers_heartbeat_and_announces_start() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    p.tick(&mut sink);

    assert_eq!(p.state(), StateId::OpenChannel);
    assert_eq!(p.timer().heartbeat, Some((0, 500)));
    assert!(matches!(sink.events[0], PollEvent::Started { .. }));
    assert!(sink.events.contains(&PollEvent::StateChanged {
        from: StateId::Init,
        to: StateId::OpenChannel,
    }));
}

#[test]
fn open_channel_issues_probe_read() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    p.tick(&mut sink);
    p.tick(&mut sink);

    assert_eq!(p.bus().opened, vec![(0, IoIntent::ReadWrite)]);
    assert_eq!(p.bus().issued, vec![Issued::Read { address: ADDR, len: 1 }]);
    assert_eq!(p.state(), StateId::ProbeDevice);
}

#[test]
fn probe_in_flight_is_idempotent() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    p.tick(&mut sink);
    p.tick(&mut sink);

    for _ in 0..5 {
        p.tick(&mut sink);
    }
    assert_eq!(p.state(), StateId::ProbeDevice);
    assert_eq!(p.bus().issued.len(), 1);
    assert_eq!(p.ticks_in_state(), 5);
}

// ── Normal cycle ──────────────────────────────────────────────

#[test]
fn ready_sensor_yields_sample_then_pauses() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    answer_status(&mut p, &mut sink, 0x40);
    assert_eq!(p.state(), StateId::QueryTemperature);
    assert_eq!(p.last_status(), Some(0x40));

    answer_temperature(&mut p, &mut sink, 0xFA);
    assert_eq!(p.state(), StateId::Pause);
    assert_eq!(p.sample_count(), 1);
    assert_eq!(sink.samples(), vec![(1, 0xFA, -6)]);

    finish_pause(&mut p, &mut sink);
    assert_eq!(p.timer().delays, vec![1_000_000]);

    assert_eq!(
        p.bus().issued,
        vec![
            Issued::Read { address: ADDR, len: 1 },
            Issued::WriteRead { address: ADDR, tx: vec![0x01], rx_len: 1 },
            Issued::WriteRead { address: ADDR, tx: vec![0x00], rx_len: 1 },
        ]
    );
}

#[test]
fn counter_advances_by_one_per_cycle() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    for (n, raw) in [0x19u8, 0x00, 0x80].into_iter().enumerate() {
        answer_status(&mut p, &mut sink, 0x40);
        answer_temperature(&mut p, &mut sink, raw);
        assert_eq!(p.sample_count(), n as u32 + 1);
        finish_pause(&mut p, &mut sink);
    }
    assert_eq!(sink.samples(), vec![(1, 0x19, 25), (2, 0x00, 0), (3, 0x80, -128)]);
}

#[test]
fn pending_status_read_does_not_advance() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    p.tick(&mut sink);
    assert_eq!(p.state(), StateId::QueryStatusRead);

    for _ in 0..10 {
        p.tick(&mut sink);
    }
    assert_eq!(p.state(), StateId::QueryStatusRead);
    assert_eq!(p.bus().issued.len(), 2);
    assert!(p.timer().delays.is_empty());
}

#[test]
fn pause_waits_for_timer() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    answer_status(&mut p, &mut sink, 0x40);
    answer_temperature(&mut p, &mut sink, 0x10);

    p.tick(&mut sink);
    for _ in 0..5 {
        p.tick(&mut sink);
        assert_eq!(p.state(), StateId::PauseWait);
    }
    assert_eq!(p.timer().delays.len(), 1);
}

#[test]
fn status_change_is_reported_once() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    for _ in 0..3 {
        answer_status(&mut p, &mut sink, 0x40);
        answer_temperature(&mut p, &mut sink, 0x10);
        finish_pause(&mut p, &mut sink);
    }
    let changes = sink
        .events
        .iter()
        .filter(|e| matches!(e, PollEvent::StatusChanged { .. }))
        .count();
    assert_eq!(changes, 1);
}

// ── Busy / standby ────────────────────────────────────────────

#[test]
fn busy_sensor_backs_off_once() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    answer_status(&mut p, &mut sink, 0x00);
    assert_eq!(p.state(), StateId::Busy);
    p.tick(&mut sink);
    finish_pause(&mut p, &mut sink);

    assert_eq!(p.timer().delays, vec![300_000]);
    assert_eq!(p.bus().issued.len(), 2);
    assert_eq!(p.sample_count(), 0);
}

#[test]
fn standby_sensor_is_woken_with_standby_cleared() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    answer_status(&mut p, &mut sink, 0x80);
    assert_eq!(p.state(), StateId::WakeUp);
    p.tick(&mut sink);
    assert_eq!(p.state(), StateId::WakeUpConfirm);
    assert_eq!(
        p.bus().last_issued(),
        Some(&Issued::Write { address: ADDR, tx: vec![0x01, 0x00] })
    );

    p.bus().complete_ok(&[]);
    p.tick(&mut sink);
    finish_pause(&mut p, &mut sink);
    assert_eq!(p.timer().delays, vec![300_000]);

    let writes = p
        .bus()
        .issued
        .iter()
        .filter(|i| matches!(i, Issued::Write { .. }))
        .count();
    assert_eq!(writes, 1);
}

#[test]
fn standby_with_data_ready_keeps_ready_bit_in_wake_write() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    answer_status(&mut p, &mut sink, 0xC0);
    assert_eq!(p.state(), StateId::WakeUp);
    p.tick(&mut sink);
    assert_eq!(
        p.bus().last_issued(),
        Some(&Issued::Write { address: ADDR, tx: vec![0x01, 0x40] })
    );
}

#[test]
fn wake_write_pending_is_idempotent() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    answer_status(&mut p, &mut sink, 0x80);
    p.tick(&mut sink);

    for _ in 0..4 {
        p.tick(&mut sink);
    }
    assert_eq!(p.state(), StateId::WakeUpConfirm);
    assert_eq!(p.bus().issued.len(), 3);
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn reserved_status_bits_are_fatal() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    answer_status(&mut p, &mut sink, 0x41);
    assert_eq!(p.state(), StateId::FatalError);
    assert_eq!(
        p.fault(),
        Some((Fault::UnexpectedDevice { status: 0x41 }, StateId::QueryStatusRead))
    );
    assert!(p.led().is_on());
    assert_eq!(sink.faults(), 1);
}

#[test]
fn fatal_error_is_absorbing() {
    capture_errors();
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    answer_status(&mut p, &mut sink, 0x3F);
    assert!(p.is_halted());
    assert!(p.fault_reported());

    let issued = p.bus().issued.len();
    for _ in 0..20 {
        p.tick(&mut sink);
        assert_eq!(p.state(), StateId::FatalError);
        assert!(p.led().is_on());
    }
    assert!(p.fault_reported());
    assert_eq!(p.bus().issued.len(), issued);
    assert!(p.timer().delays.is_empty());
    assert_eq!(sink.faults(), 1);

    let lines = error_lines();
    assert_eq!(lines.len(), 1, "fatal line logged {} times: {:?}", lines.len(), lines);
    assert!(lines[0].contains("QueryStatusRead"), "{}", lines[0]);
}

#[test]
fn halting_tick_writes_fatal_line() {
    capture_errors();
    let mut p = poller();
    let mut sink = RecordingSink::default();
    p.tick(&mut sink);
    p.tick(&mut sink);
    p.bus().complete_err();

    // Same shape as the simulator loop: stop on the tick that halts.
    p.tick(&mut sink);
    assert!(p.is_halted());
    assert!(p.fault_reported());

    let lines = error_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("ProbeDevice"), "{}", lines[0]);
    assert!(lines[0].contains("no device responded at 0x48"), "{}", lines[0]);
}

#[test]
fn heartbeat_registration_failure_is_fatal() {
    let mut timer = MockTimer::new();
    timer.fail_register = true;
    let mut p = poller_with(PollerConfig::default(), MockBus::new(), timer);
    let mut sink = RecordingSink::default();

    p.tick(&mut sink);
    assert_eq!(p.state(), StateId::FatalError);
    assert_eq!(
        p.fault(),
        Some((Fault::Setup("register heartbeat timer"), StateId::Init))
    );
    assert!(p.bus().opened.is_empty());
}

#[test]
fn open_failure_is_fatal() {
    let mut bus = MockBus::new();
    bus.fail_open = true;
    let mut p = poller_with(PollerConfig::default(), bus, MockTimer::new());
    let mut sink = RecordingSink::default();

    p.tick(&mut sink);
    p.tick(&mut sink);
    assert_eq!(
        p.fault(),
        Some((Fault::Setup("open bus channel"), StateId::OpenChannel))
    );
    assert!(p.bus().issued.is_empty());
}

#[test]
fn probe_nak_means_no_device() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    p.tick(&mut sink);
    p.tick(&mut sink);
    p.bus().complete_err();
    p.tick(&mut sink);

    assert_eq!(
        p.fault(),
        Some((Fault::NoDevice { address: ADDR }, StateId::ProbeDevice))
    );
}

#[test]
fn status_transfer_error_is_fatal() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    p.tick(&mut sink);
    p.bus().complete_err();
    p.tick(&mut sink);

    assert_eq!(
        p.fault(),
        Some((Fault::TransferFailed("status query"), StateId::QueryStatusRead))
    );
}

#[test]
fn temperature_transfer_error_keeps_counter() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    answer_status(&mut p, &mut sink, 0x40);
    p.tick(&mut sink);
    p.bus().complete_err();
    p.tick(&mut sink);

    assert!(p.is_halted());
    assert_eq!(p.sample_count(), 0);
    assert!(sink.samples().is_empty());
}

#[test]
fn rejected_issue_is_fatal() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    p.bus_mut().reject_issue = true;
    p.tick(&mut sink);

    assert_eq!(
        p.fault(),
        Some((Fault::TransferRejected("status query"), StateId::QueryStatus))
    );
}

#[test]
fn pause_below_minimum_is_fatal() {
    let config = PollerConfig {
        sample_interval_us: 500,
        ..PollerConfig::default()
    };
    let mut p = poller_with(config, MockBus::new(), MockTimer::new());
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    answer_status(&mut p, &mut sink, 0x40);
    answer_temperature(&mut p, &mut sink, 0x10);
    p.tick(&mut sink);

    assert_eq!(
        p.fault(),
        Some((Fault::PauseTooShort { us: 500 }, StateId::Pause))
    );
    assert!(p.timer().delays.is_empty());
}

#[test]
fn delay_request_failure_is_fatal() {
    let mut timer = MockTimer::new();
    timer.delay_error = Some(TimerError::NoFreeSlot);
    let mut p = poller_with(PollerConfig::default(), MockBus::new(), timer);
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    answer_status(&mut p, &mut sink, 0x00);
    p.tick(&mut sink);
    p.tick(&mut sink);

    assert_eq!(p.fault(), Some((Fault::DelayRequest, StateId::Pause)));
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_toggles_until_fatal() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);

    p.timer().fire_heartbeat();
    assert!(p.led().is_on());
    p.timer().fire_heartbeat();
    assert!(!p.led().is_on());

    answer_status(&mut p, &mut sink, 0x01);
    assert!(p.is_halted());
    for _ in 0..3 {
        p.timer().fire_heartbeat();
        assert!(p.led().is_on());
    }
}

#[test]
fn initialize_after_fatal_starts_over() {
    let mut p = poller();
    let mut sink = RecordingSink::default();
    bring_up(&mut p, &mut sink);
    answer_status(&mut p, &mut sink, 0x41);
    p.tick(&mut sink);
    assert!(p.fault_reported());

    p.initialize();
    assert_eq!(p.state(), StateId::Init);
    assert!(p.fault().is_none());
    assert!(!p.fault_reported());
    assert_eq!(p.last_status(), None);

    // The running heartbeat is reused and its gate released again.
    p.tick(&mut sink);
    assert_eq!(p.state(), StateId::OpenChannel);
    assert_eq!(p.timer().registrations, 1);
    let before = p.led().is_on();
    p.timer().fire_heartbeat();
    assert_ne!(p.led().is_on(), before);
}

/// Indicator that only counts toggles.
#[derive(Default)]
struct CountingLed {
    toggles: AtomicU32,
    on: AtomicBool,
}

impl StatusIndicator for CountingLed {
    fn toggle(&self) {
        self.toggles.fetch_add(1, Ordering::Relaxed);
        self.on.fetch_xor(true, Ordering::Relaxed);
    }

    fn set_on(&self) {
        self.on.store(true, Ordering::Relaxed);
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}

#[test]
fn restart_keeps_a_single_heartbeat_thread() {
    let config = PollerConfig {
        heartbeat_period_ms: 50,
        ..PollerConfig::default()
    };
    let led = Arc::new(CountingLed::default());
    let mut p = SensorPoller::new(config, MockBus::new(), StdTimer::new(), Arc::clone(&led));
    let mut sink = RecordingSink::default();

    p.initialize();
    p.tick(&mut sink);
    p.initialize();
    p.tick(&mut sink);
    assert_eq!(p.state(), StateId::OpenChannel);

    let start = led.toggles.load(Ordering::Relaxed);
    let began = Instant::now();
    thread::sleep(Duration::from_millis(500));
    let elapsed_ms = began.elapsed().as_millis() as u32;
    let toggles = led.toggles.load(Ordering::Relaxed) - start;

    // One thread toggles at most once per period (plus one at the edge).
    assert!(
        toggles <= elapsed_ms / 50 + 1,
        "{} toggles in {}ms: more than one heartbeat thread",
        toggles,
        elapsed_ms
    );
    assert!(toggles > 0);
}

// ── Full stack against the simulated sensor ───────────────────

fn fast_config() -> PollerConfig {
    PollerConfig {
        heartbeat_period_ms: 5,
        sample_interval_us: 1_000,
        busy_retry_us: 1_000,
        wake_settle_us: 1_000,
        ..PollerConfig::default()
    }
}

fn run_until_samples<B: TransferPort>(
    p: &mut SensorPoller<B, StdTimer, PinIndicator<SimPin>>,
    sink: &mut RecordingSink,
    samples: u32,
) {
    for _ in 0..20_000 {
        p.tick(sink);
        if p.sample_count() >= samples || p.is_halted() {
            return;
        }
        thread::sleep(Duration::from_micros(100));
    }
}

#[test]
fn blocking_bus_reads_standby_sensor() {
    let sensor = SimTc74::new(ADDR, -6).in_standby().powering_up(2);
    let bus = BlockingBus::new(sensor, 0);
    let led = Arc::new(PinIndicator::new(SimPin::new()));
    let mut p = SensorPoller::new(fast_config(), bus, StdTimer::new(), led);
    p.initialize();
    let mut sink = RecordingSink::default();

    run_until_samples(&mut p, &mut sink, 3);

    assert!(p.fault().is_none(), "fault: {:?}", p.fault());
    assert!(p.sample_count() >= 3);
    assert!(sink.samples().iter().all(|&(_, raw, c)| raw == 0xFA && c == -6));
    assert!(!p.bus().inner().is_standby());
}

#[test]
fn threaded_bus_reads_sensor() {
    let sensor = SimTc74::new(ADDR, 31);
    let bus = ThreadedBus::spawn(sensor, 0, Duration::from_micros(200)).expect("spawn worker");
    let led = Arc::new(PinIndicator::new(SimPin::new()));
    let mut p = SensorPoller::new(fast_config(), bus, StdTimer::new(), led);
    p.initialize();
    let mut sink = RecordingSink::default();

    run_until_samples(&mut p, &mut sink, 2);

    assert!(p.fault().is_none(), "fault: {:?}", p.fault());
    let samples = sink.samples();
    assert_eq!(samples[0], (1, 31, 31));
    assert_eq!(samples[1].0, 2);
}

#[test]
fn missing_sensor_halts_at_probe() {
    let mut sensor = SimTc74::new(ADDR, 20);
    sensor.set_present(false);
    let led = Arc::new(PinIndicator::new(SimPin::new()));
    let mut p = SensorPoller::new(fast_config(), BlockingBus::new(sensor, 0), StdTimer::new(), led);
    p.initialize();
    let mut sink = RecordingSink::default();

    run_until_samples(&mut p, &mut sink, 1);

    assert_eq!(
        p.fault(),
        Some((Fault::NoDevice { address: ADDR }, StateId::ProbeDevice))
    );
    assert!(p.led().is_on());
}
