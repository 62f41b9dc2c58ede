// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::client::ClientError;
    use crate::interceptor::{
        AsyncInterceptorFactory, AsyncInterceptorSupport, AsyncInvocationInterceptor,
    };
    use std::sync::{Arc, Mutex};

    type EventLog = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum FailsOn {
        Never,
        Prepare,
        Apply,
        Remove,
    }

    #[derive(Debug)]
    struct RecordingInterceptor {
        name: &'static str,
        mode: FailsOn,
        events: EventLog,
    }

    impl RecordingInterceptor {
        fn record(&self, phase: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:{}", phase, self.name));
        }
    }

    impl AsyncInvocationInterceptor for RecordingInterceptor {
        fn prepare_context(&mut self) -> Result<(), ClientError> {
            if self.mode == FailsOn::Prepare {
                return Err(ClientError::Interceptor(format!(
                    "{} fails on prepare",
                    self.name
                )));
            }
            self.record("prepare");
            Ok(())
        }

        fn apply_context(&mut self) -> Result<(), ClientError> {
            if self.mode == FailsOn::Apply {
                return Err(ClientError::Interceptor(format!(
                    "{} fails on apply",
                    self.name
                )));
            }
            self.record("apply");
            Ok(())
        }

        fn remove_context(&mut self) -> Result<(), ClientError> {
            self.record("remove");
            if self.mode == FailsOn::Remove {
                return Err(ClientError::Interceptor(format!(
                    "{} fails on remove",
                    self.name
                )));
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct RecordingFactory {
        name: &'static str,
        mode: FailsOn,
        events: EventLog,
    }

    impl RecordingFactory {
        fn new(name: &'static str, mode: FailsOn, events: &EventLog) -> Arc<Self> {
            Arc::new(Self {
                name,
                mode,
                events: events.clone(),
            })
        }
    }

    impl AsyncInterceptorFactory for RecordingFactory {
        fn new_interceptor(&self) -> Box<dyn AsyncInvocationInterceptor> {
            Box::new(RecordingInterceptor {
                name: self.name,
                mode: self.mode,
                events: self.events.clone(),
            })
        }
    }

    fn support(modes: &[(&'static str, FailsOn)], events: &EventLog) -> AsyncInterceptorSupport {
        AsyncInterceptorSupport::register(
            modes
                .iter()
                .map(|(name, mode)| {
                    RecordingFactory::new(name, *mode, events) as Arc<dyn AsyncInterceptorFactory>
                })
                .collect(),
        )
    }

    fn drain(events: &EventLog) -> Vec<String> {
        events.lock().unwrap().drain(..).collect()
    }

    #[test]
    fn test_empty_support_is_noop() {
        let support = AsyncInterceptorSupport::register(Vec::new());
        assert!(support.is_noop());

        let mut set = support.prepare().unwrap();
        assert!(set.is_empty());
        set.apply().unwrap();
        set.remove_on_success().unwrap();
    }

    #[test]
    fn test_phase_ordering() {
        let events: EventLog = Default::default();
        let support = support(&[("A", FailsOn::Never), ("B", FailsOn::Never)], &events);

        let mut set = support.prepare().unwrap();
        assert_eq!(set.len(), 2);
        set.apply().unwrap();
        set.remove_on_success().unwrap();

        // Prepare in factory order, apply reversed, remove in factory order.
        assert_eq!(
            drain(&events),
            vec![
                "prepare:A",
                "prepare:B",
                "apply:B",
                "apply:A",
                "remove:A",
                "remove:B"
            ]
        );
    }

    #[test]
    fn test_apply_reverses_for_longer_chains() {
        let events: EventLog = Default::default();
        let support = support(
            &[
                ("A", FailsOn::Never),
                ("B", FailsOn::Never),
                ("C", FailsOn::Never),
            ],
            &events,
        );

        let mut set = support.prepare().unwrap();
        set.apply().unwrap();

        assert_eq!(
            drain(&events),
            vec!["prepare:A", "prepare:B", "prepare:C", "apply:C", "apply:B", "apply:A"]
        );
    }

    #[test]
    fn test_prepare_failure_aborts_without_cleanup() {
        let events: EventLog = Default::default();
        let support = support(&[("A", FailsOn::Never), ("B", FailsOn::Prepare)], &events);

        let err = support.prepare().unwrap_err();
        assert!(err.to_string().contains("B fails on prepare"));

        // A prepared successfully but is never applied or removed.
        assert_eq!(drain(&events), vec!["prepare:A"]);
    }

    #[test]
    fn test_apply_failure_stops_remaining_applies() {
        let events: EventLog = Default::default();
        let support = support(&[("A", FailsOn::Apply), ("B", FailsOn::Never)], &events);

        let mut set = support.prepare().unwrap();
        let err = set.apply().unwrap_err();
        assert!(err.to_string().contains("A fails on apply"));

        // B applied first (reverse order); A faulted before applying.
        assert_eq!(drain(&events), vec!["prepare:A", "prepare:B", "apply:B"]);
    }

    #[test]
    fn test_remove_runs_for_every_interceptor_despite_faults() {
        let events: EventLog = Default::default();
        let support = support(
            &[
                ("A", FailsOn::Remove),
                ("B", FailsOn::Never),
                ("C", FailsOn::Remove),
            ],
            &events,
        );

        let mut set = support.prepare().unwrap();
        set.apply().unwrap();
        let report = set.remove_on_success().unwrap_err();

        // Both faults reported: first as primary, second suppressed.
        assert!(report.primary.to_string().contains("A fails on remove"));
        assert_eq!(report.suppressed.len(), 1);
        assert!(report.suppressed[0].to_string().contains("C fails on remove"));

        let remove_events: Vec<String> = drain(&events)
            .into_iter()
            .filter(|e| e.starts_with("remove"))
            .collect();
        assert_eq!(remove_events, vec!["remove:A", "remove:B", "remove:C"]);
    }

    #[test]
    fn test_remove_on_fault_keeps_original_primary() {
        let events: EventLog = Default::default();
        let support = support(&[("A", FailsOn::Remove), ("B", FailsOn::Remove)], &events);

        let mut set = support.prepare().unwrap();
        set.apply().unwrap();

        let report = set.remove_on_fault(ClientError::Other("call blew up".to_string()));

        assert_eq!(report.primary.to_string(), "call blew up");
        assert_eq!(report.suppressed.len(), 2);
        assert!(report.suppressed[0].to_string().contains("A fails on remove"));
        assert!(report.suppressed[1].to_string().contains("B fails on remove"));

        let remove_events: Vec<String> = drain(&events)
            .into_iter()
            .filter(|e| e.starts_with("remove"))
            .collect();
        assert_eq!(remove_events, vec!["remove:A", "remove:B"]);
    }

    #[test]
    fn test_clean_run_reports_nothing() {
        let events: EventLog = Default::default();
        let support = support(&[("A", FailsOn::Never)], &events);

        let mut set = support.prepare().unwrap();
        set.apply().unwrap();
        assert!(set.remove_on_success().is_ok());
    }

    #[test]
    fn test_sets_are_independent_per_invocation() {
        let events: EventLog = Default::default();
        let support = support(&[("A", FailsOn::Never)], &events);

        let mut first = support.prepare().unwrap();
        let mut second = support.prepare().unwrap();

        first.apply().unwrap();
        second.apply().unwrap();
        first.remove_on_success().unwrap();
        second.remove_on_success().unwrap();

        // Two full triads, one per prepared set.
        let all = drain(&events);
        assert_eq!(all.iter().filter(|e| e.starts_with("prepare")).count(), 2);
        assert_eq!(all.iter().filter(|e| e.starts_with("remove")).count(), 2);
    }
}
