//! End-to-end host port tests: clock, timer, signal, guard and watchdog
//! wired together the way a VM embedding uses them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use vmport_core::{InterruptContext, Timebase};
use vmport_posix::{CondvarSignal, HostClock, HostWatchdog, ThreadWakeupTimer, Ticker};
use vmport_sched::{wake_vm, IdleSignal, ScheduleOutcome, WakeupScheduler};
use vmport_wdt::WatchdogSupervisor;

#[test]
fn test_vm_sleep_wakeup_cycle() {
    let interrupts = Arc::new(InterruptContext::new());
    let signal = Arc::new(CondvarSignal::new());
    let clock = HostClock::new();
    let timebase = Timebase::new(1000);

    let scheduler = Arc::new(WakeupScheduler::new(
        ThreadWakeupTimer::spawn(timebase),
        timebase,
    ));

    // expiry handler acts as the timer interrupt: claim the context, record
    // the expiry, wake the VM through the ISR-safe path
    let fired_in_interrupt = Arc::new(AtomicBool::new(false));
    {
        let scheduler = Arc::downgrade(&scheduler);
        let interrupts = Arc::clone(&interrupts);
        let signal = Arc::clone(&signal);
        let fired_in_interrupt = Arc::clone(&fired_in_interrupt);
        // the handler borrows the timer owned by the scheduler, so register
        // through the accessor after construction
        scheduler
            .upgrade()
            .unwrap()
            .timer()
            .set_expiry_handler(move || {
                let entered = interrupts.enter();
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.note_timer_fired();
                }
                fired_in_interrupt.store(interrupts.is_in_interrupt(), Ordering::SeqCst);
                wake_vm(signal.as_ref(), &interrupts);
                interrupts.leave(entered);
            });
    }

    // consume the initial release so the next acquire really parks
    signal.acquire();

    let now = clock.platform_time_ms();
    let outcome = scheduler.schedule(now + 50, now).unwrap();
    assert_eq!(outcome, ScheduleOutcome::Armed);

    // the VM parks; the timer wakes it close to the deadline
    assert!(
        signal.acquire_timeout(Duration::from_secs(2)),
        "VM was never woken"
    );
    let woken_at = clock.platform_time_ms();
    assert!(woken_at >= now + 45, "woke too early: {} ms", woken_at - now);
    assert!(fired_in_interrupt.load(Ordering::SeqCst));

    // the handler wakes the VM before leaving its bracket, so give it a
    // moment to finish before checking the context was released
    thread::sleep(Duration::from_millis(20));
    assert!(!interrupts.is_in_interrupt(), "interrupt context leaked");
}

#[test]
fn test_past_deadline_wakes_from_task_context() {
    let interrupts = Arc::new(InterruptContext::new());
    let signal = Arc::new(CondvarSignal::new());
    let clock = HostClock::new();
    let timebase = Timebase::new(1000);
    let scheduler = WakeupScheduler::new(ThreadWakeupTimer::spawn(timebase), timebase);

    signal.acquire();

    let now = clock.platform_time_ms();
    assert_eq!(
        scheduler.schedule(now - 10, now),
        Ok(ScheduleOutcome::Immediate)
    );

    // scheduling task wakes the VM itself, from plain task context
    wake_vm(signal.as_ref(), &interrupts);
    assert!(signal.acquire_timeout(Duration::from_millis(100)));
}

#[test]
fn test_ticker_keeps_watchdog_refreshed() {
    let interrupts = Arc::new(InterruptContext::new());
    let supervisor = Arc::new(Mutex::new(WatchdogSupervisor::new(HostWatchdog::new(
        Duration::from_millis(100),
    ))));

    let checkpoint = {
        let mut dog = supervisor.lock().unwrap();
        dog.init().unwrap();
        let id = dog.register_checkpoint().unwrap();
        dog.start().unwrap();
        id
    };

    // every tick proves the tick machinery is alive
    let ticker_supervisor = Arc::clone(&supervisor);
    let mut ticker = Ticker::start(100, Arc::clone(&interrupts), move || {
        let _ = ticker_supervisor.lock().unwrap().checkpoint(checkpoint);
    });

    thread::sleep(Duration::from_millis(300));
    assert!(
        !supervisor.lock().unwrap().reset_was_watchdog(),
        "watchdog expired although the ticker was refreshing it"
    );

    // once the ticker stops, refreshes stop and the countdown lapses
    ticker.stop();
    thread::sleep(Duration::from_millis(250));
    assert!(supervisor.lock().unwrap().reset_was_watchdog());
}

#[test]
fn test_wall_clock_for_scheduled_work() {
    let clock = HostClock::new();
    clock.set_application_time(1_700_000_000_000);

    // deadlines computed in application time still resolve against the
    // platform clock the scheduler runs on
    let app_deadline = clock.application_time_ms() + 30;
    let platform_deadline = app_deadline - (clock.application_time_ms() - clock.platform_time_ms());

    let timebase = Timebase::new(1000);
    let scheduler = WakeupScheduler::new(ThreadWakeupTimer::spawn(timebase), timebase);
    let outcome = scheduler
        .schedule(platform_deadline, clock.platform_time_ms())
        .unwrap();
    assert_eq!(outcome, ScheduleOutcome::Armed);
}
