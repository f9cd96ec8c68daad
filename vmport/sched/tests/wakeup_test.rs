//! Wakeup flow tests for vmport-sched

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use vmport_core::{InterruptContext, Timebase};
use vmport_sched::{wake_vm, IdleSignal, ScheduleOutcome, WakeupScheduler, WakeupTimer};

#[derive(Default)]
struct RecordingTimer {
    armed_ticks: Mutex<Option<i64>>,
}

impl WakeupTimer for RecordingTimer {
    fn arm(&self, ticks: i64) -> vmport_core::PortResult<()> {
        *self.armed_ticks.lock().unwrap() = Some(ticks);
        Ok(())
    }

    fn stop(&self) -> vmport_core::PortResult<()> {
        *self.armed_ticks.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
struct CountingSignal {
    releases: AtomicUsize,
    isr_releases: AtomicUsize,
}

impl IdleSignal for CountingSignal {
    fn acquire(&self) {}

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn release_from_isr(&self) {
        self.isr_releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_expiry_from_interrupt_takes_isr_path() {
    let interrupts = InterruptContext::new();
    let signal = CountingSignal::default();
    let scheduler = WakeupScheduler::new(RecordingTimer::default(), Timebase::new(100));

    // VM requests a wakeup 40 ms out; at 100 Hz that is 4 ticks
    assert_eq!(scheduler.schedule(140, 100), Ok(ScheduleOutcome::Armed));

    // the timer expiry runs as an interrupt handler
    let entered = interrupts.enter();
    assert!(entered);
    scheduler.note_timer_fired();
    wake_vm(&signal, &interrupts);
    interrupts.leave(entered);

    assert_eq!(signal.isr_releases.load(Ordering::SeqCst), 1);
    assert_eq!(signal.releases.load(Ordering::SeqCst), 0);
    assert!(scheduler.timer_fired());
}

#[test]
fn test_immediate_wakeup_from_task_context() {
    let interrupts = InterruptContext::new();
    let signal = CountingSignal::default();
    let scheduler = WakeupScheduler::new(RecordingTimer::default(), Timebase::new(100));

    // deadline already reached: the scheduling task wakes the VM itself
    assert_eq!(scheduler.schedule(90, 100), Ok(ScheduleOutcome::Immediate));
    wake_vm(&signal, &interrupts);

    assert_eq!(signal.releases.load(Ordering::SeqCst), 1);
    assert_eq!(signal.isr_releases.load(Ordering::SeqCst), 0);
}

#[test]
fn test_fired_deadline_does_not_absorb_new_requests() {
    let scheduler = WakeupScheduler::new(RecordingTimer::default(), Timebase::new(1000));

    scheduler.schedule(200, 100).unwrap();
    scheduler.note_timer_fired();

    // after the expiry was consumed, even a later deadline needs the timer
    assert_eq!(scheduler.schedule(900, 250), Ok(ScheduleOutcome::Armed));
    assert_eq!(
        *scheduler.timer().armed_ticks.lock().unwrap(),
        Some(650),
        "timer must be re-armed for the new deadline"
    );
}
