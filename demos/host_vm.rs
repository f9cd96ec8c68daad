//! A managed-runtime VM embedded on the host port.
//!
//! This example wires the whole port together the way a VM task uses it:
//! - a tick thread that runs its callback in interrupt context and
//!   reports liveness to the watchdog
//! - a wakeup scheduler driving timed sleeps through a one-shot timer
//! - an idle signal the VM parks on between scheduled wakeups
//! - a slot pool holding the VM's periodic service descriptors
//! - a background worker for jobs the VM defers off its own thread
//! - Ctrl-C shutdown through the port hook
//!
//! Run with `RUST_LOG=debug` to watch the port's own logging.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vmport_core::{InterruptContext, Timebase};
use vmport_mem::SlotPool;
use vmport_posix::{
    install_shutdown_hook, CondvarSignal, HostClock, HostError, HostWatchdog, ThreadWakeupTimer,
    Ticker, Worker,
};
use vmport_sched::{wake_vm, IdleSignal, ScheduleOutcome, WakeupScheduler};
use vmport_wdt::WatchdogSupervisor;

/// Tick interrupt rate, matching a typical RTOS configuration.
const TICK_RATE_HZ: u32 = 100;

/// How often the VM schedules its next wakeup.
const WAKEUP_PERIOD_MS: i64 = 200;

/// Scheduled wakeups before the demo shuts itself down.
const RUN_CYCLES: u32 = 15;

/// Watchdog budget; two missed wakeup periods trip it.
const WATCHDOG_TIMEOUT: Duration = Duration::from_millis(2 * WAKEUP_PERIOD_MS as u64);

/// A periodic VM service kept in pooled storage.
struct Service {
    name: &'static str,
    runs: u32,
}

static SERVICES: SlotPool<Service, 4> = SlotPool::new();

fn main() -> Result<(), HostError> {
    env_logger::init();

    println!("vmport host-vm demo");
    println!("  tick rate    {} Hz", TICK_RATE_HZ);
    println!("  wakeup every {} ms, {} cycles (Ctrl-C stops early)", WAKEUP_PERIOD_MS, RUN_CYCLES);
    println!();

    let interrupts = Arc::new(InterruptContext::new());
    let signal = Arc::new(CondvarSignal::new());
    let clock = HostClock::new();
    let timebase = Timebase::new(1000);

    // pretend the VM synchronized its wall clock at boot
    clock.set_application_time(1_700_000_000_000);

    let scheduler = Arc::new(WakeupScheduler::new(
        ThreadWakeupTimer::spawn(timebase),
        timebase,
    ));

    // timer expiry behaves like a timer ISR: claim the interrupt context,
    // record the expiry, wake the VM through the ISR-safe path
    {
        let weak = Arc::downgrade(&scheduler);
        let interrupts = Arc::clone(&interrupts);
        let signal = Arc::clone(&signal);
        scheduler.timer().set_expiry_handler(move || {
            let entered = interrupts.enter();
            if let Some(scheduler) = weak.upgrade() {
                scheduler.note_timer_fired();
            }
            wake_vm(signal.as_ref(), &interrupts);
            interrupts.leave(entered);
        });
    }

    // two liveness checkpoints: the watchdog refreshes only when both the
    // tick thread and the VM loop have reported in
    let supervisor = Arc::new(Mutex::new(WatchdogSupervisor::new(HostWatchdog::new(
        WATCHDOG_TIMEOUT,
    ))));
    let (tick_alive, vm_alive) = {
        let mut dog = supervisor.lock().unwrap();
        dog.init()?;
        let tick = dog.register_checkpoint()?;
        let vm = dog.register_checkpoint()?;
        dog.start()?;
        (tick, vm)
    };

    let tick_count = Arc::new(AtomicU32::new(0));
    let ticks_in_context = Arc::new(AtomicU32::new(0));
    let mut ticker = {
        let supervisor = Arc::clone(&supervisor);
        let interrupts = Arc::clone(&interrupts);
        let tick_count = Arc::clone(&tick_count);
        let ticks_in_context = Arc::clone(&ticks_in_context);
        Ticker::start(TICK_RATE_HZ, Arc::clone(&interrupts), move || {
            tick_count.fetch_add(1, Ordering::Relaxed);
            if interrupts.is_in_interrupt() {
                ticks_in_context.fetch_add(1, Ordering::Relaxed);
            }
            let _ = supervisor.lock().unwrap().checkpoint(tick_alive);
        })
    };

    let worker: Worker<4, 2> = Worker::spawn("vm-worker")?;

    let stop = Arc::new(AtomicBool::new(false));
    install_shutdown_hook(Arc::clone(&stop), Arc::clone(&signal))?;

    let gc = SERVICES.reserve(Service { name: "gc", runs: 0 })?;
    let profiler = SERVICES.reserve(Service { name: "profiler", runs: 0 })?;

    // consume the initial signal token so the first wait really parks
    signal.acquire();

    println!(
        "VM starting at platform {} ms / application {} ms",
        clock.platform_time_ms(),
        clock.application_time_ms()
    );

    let mut cycles = 0u32;
    while cycles < RUN_CYCLES && !stop.load(Ordering::SeqCst) {
        let now = clock.platform_time_ms();
        match scheduler.schedule(now + WAKEUP_PERIOD_MS, now)? {
            ScheduleOutcome::Immediate => {}
            ScheduleOutcome::Armed | ScheduleOutcome::AlreadyPending => {
                if !signal.acquire_timeout(Duration::from_millis(2 * WAKEUP_PERIOD_MS as u64)) {
                    log::warn!("wakeup overdue, continuing anyway");
                }
            }
        }
        if stop.load(Ordering::SeqCst) {
            break;
        }
        cycles += 1;

        // the VM is demonstrably alive
        supervisor.lock().unwrap().checkpoint(vm_alive)?;

        // run the pooled services on the VM thread
        let handle = if cycles % 3 == 0 { gc } else { profiler };
        let (name, runs) = SERVICES.with(handle, |service| {
            service.runs += 1;
            (service.name, service.runs)
        })?;
        println!(
            "[cycle {:>2}] t={} ms  service {} (run {})",
            cycles,
            clock.platform_time_ms(),
            name,
            runs
        );

        // heavier bookkeeping goes to the worker thread
        if cycles % 5 == 0 {
            let snapshot = SERVICES.stats();
            worker.execute(move || {
                log::info!(
                    "pool snapshot: {}/{} slots used",
                    snapshot.used_slots,
                    snapshot.total_slots
                );
            })?;
        }
    }

    if stop.load(Ordering::SeqCst) {
        println!("shutdown requested");
    }

    ticker.stop();
    supervisor.lock().unwrap().stop()?;
    let gc_runs = SERVICES.release(gc)?.runs;
    let profiler_runs = SERVICES.release(profiler)?.runs;

    let ticks = tick_count.load(Ordering::Relaxed);
    println!();
    println!("VM stopped after {} cycles", cycles);
    println!("  ticks seen          {}", ticks);
    println!(
        "  ticks in context    {}",
        ticks_in_context.load(Ordering::Relaxed)
    );
    println!("  gc runs             {}", gc_runs);
    println!("  profiler runs       {}", profiler_runs);
    println!(
        "  watchdog tripped    {}",
        supervisor.lock().unwrap().reset_was_watchdog()
    );
    println!(
        "  pool low watermark  {} free",
        SERVICES.stats().min_free_slots
    );

    Ok(())
}
