// src/telemetry.rs

//! Diagnostic event and counter collection, compiled in only with the
//! `strand_telemetry` feature. Without the feature every instrumentation call
//! is an inlined no-op.

#[cfg(feature = "strand_telemetry")]
pub mod enabled {
  //! Collector implementation used when `strand_telemetry` is on.

  use std::collections::HashMap;
  use std::fmt;
  use std::sync::Mutex;
  use std::time::Instant;

  /// One recorded instrumentation event.
  #[derive(Clone)]
  pub struct TelemetryEvent {
    /// Global sequence number, assigned in recording order.
    pub seq_id: usize,
    /// When the event was recorded.
    pub timestamp: Instant,
    /// Code location (e.g. `BoundedChannel`).
    pub location: &'static str,
    /// Event kind (e.g. `RecvPark`, `Close`).
    pub event_type: &'static str,
    /// Optional free-form detail.
    pub message: Option<String>,
  }

  impl fmt::Debug for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TelemetryEvent")
        .field("seq", &self.seq_id)
        .field("loc", &self.location)
        .field("evt", &self.event_type)
        .field("msg", &self.message.as_deref().unwrap_or(""))
        .finish()
    }
  }

  type CounterKey = (&'static str, &'static str); // (location, counter_name)

  struct CollectorData {
    events: Vec<TelemetryEvent>,
    counters: HashMap<CounterKey, usize>,
    next_seq: usize,
    start_time: Instant,
  }

  impl CollectorData {
    fn new() -> Self {
      CollectorData {
        events: Vec::new(),
        counters: HashMap::new(),
        next_seq: 0,
        start_time: Instant::now(),
      }
    }
  }

  lazy_static::lazy_static! {
    static ref GLOBAL_COLLECTOR: Mutex<CollectorData> = Mutex::new(CollectorData::new());
  }

  /// Records a single event.
  pub fn log_event_fn(location: &'static str, event_type: &'static str, message: Option<String>) {
    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      let seq_id = collector.next_seq;
      collector.next_seq += 1;
      collector.events.push(TelemetryEvent {
        seq_id,
        timestamp: Instant::now(),
        location,
        event_type,
        message,
      });
    } else {
      eprintln!("[TELEMETRY ERROR] collector mutex poisoned while recording event");
    }
  }

  /// Bumps the named counter at `location`.
  pub fn increment_counter_fn(location: &'static str, counter_name: &'static str) {
    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      *collector.counters.entry((location, counter_name)).or_insert(0) += 1;
    } else {
      eprintln!("[TELEMETRY ERROR] collector mutex poisoned while incrementing counter");
    }
  }

  /// Current value of a counter; 0 when it was never incremented.
  pub fn counter_value_fn(location: &'static str, counter_name: &'static str) -> usize {
    GLOBAL_COLLECTOR
      .lock()
      .map(|collector| collector.counters.get(&(location, counter_name)).copied().unwrap_or(0))
      .unwrap_or(0)
  }

  /// Dumps every recorded event and counter to stdout.
  pub fn print_telemetry_report_fn() {
    let Ok(collector) = GLOBAL_COLLECTOR.lock() else {
      eprintln!("[TELEMETRY ERROR] collector mutex poisoned, cannot print report");
      return;
    };

    println!("\n--- Strand Telemetry Report ---");

    if collector.events.is_empty() {
      println!("[Events] none recorded");
    } else {
      println!("[Events] {} recorded:", collector.events.len());
      for event in &collector.events {
        let offset = event.timestamp.duration_since(collector.start_time);
        println!(
          "  +{:<10.6}s [Seq:{:<5}] Loc:{:<18} Evt:{:<14} Msg: {}",
          offset.as_secs_f64(),
          event.seq_id,
          event.location,
          event.event_type,
          event.message.as_deref().unwrap_or("")
        );
      }
    }

    if collector.counters.is_empty() {
      println!("[Counters] none recorded");
    } else {
      let mut sorted: Vec<_> = collector.counters.iter().collect();
      sorted.sort_by_key(|(key, _)| *key);
      println!("[Counters] {} recorded:", sorted.len());
      for ((location, name), count) in sorted {
        println!("  Loc:{:<18} Counter:{:<20} Value: {}", location, name, count);
      }
    }

    println!("--- End of Telemetry Report ---");
  }

  /// Clears all recorded events and counters and restarts the clock.
  pub fn clear_telemetry_fn() {
    if let Ok(mut collector) = GLOBAL_COLLECTOR.lock() {
      collector.events.clear();
      collector.counters.clear();
      collector.next_seq = 0;
      collector.start_time = Instant::now();
    }
  }
}

#[cfg(not(feature = "strand_telemetry"))]
pub mod disabled {
  //! No-op shims compiled when `strand_telemetry` is off.

  /// No-op.
  #[inline(always)]
  pub fn log_event_fn(_location: &'static str, _event_type: &'static str, _message: Option<String>) {}

  /// No-op.
  #[inline(always)]
  pub fn increment_counter_fn(_location: &'static str, _counter_name: &'static str) {}

  /// Always 0.
  #[inline(always)]
  pub fn counter_value_fn(_location: &'static str, _counter_name: &'static str) -> usize {
    0
  }

  /// No-op.
  #[inline(always)]
  pub fn print_telemetry_report_fn() {}

  /// No-op.
  #[inline(always)]
  pub fn clear_telemetry_fn() {}
}

// Re-export the correct set of functions based on the feature flag.
#[cfg(feature = "strand_telemetry")]
pub use enabled::{
  clear_telemetry_fn as clear_telemetry, counter_value_fn as counter_value,
  increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};

#[cfg(not(feature = "strand_telemetry"))]
pub use disabled::{
  clear_telemetry_fn as clear_telemetry, counter_value_fn as counter_value,
  increment_counter_fn as increment_counter, log_event_fn as log_event,
  print_telemetry_report_fn as print_telemetry_report,
};

#[cfg(all(test, feature = "strand_telemetry"))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn counters_accumulate_and_clear() {
    clear_telemetry();

    increment_counter("test", "Ticks");
    increment_counter("test", "Ticks");
    assert_eq!(counter_value("test", "Ticks"), 2);

    log_event("test", "Something", Some("detail".to_string()));
    print_telemetry_report();

    clear_telemetry();
    assert_eq!(counter_value("test", "Ticks"), 0);
  }

  #[test]
  #[serial]
  fn select_fast_path_is_instrumented() {
    clear_telemetry();

    let chan: crate::UnboundedChannel<i32> = [1].into_iter().collect();
    crate::select::select_or([crate::select::recv(&chan)], || {
      panic!("descriptor was ready");
    });

    assert_eq!(counter_value("select", "FastCommits"), 1);
    clear_telemetry();
  }
}
