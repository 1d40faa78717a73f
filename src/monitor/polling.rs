use anyhow::Result;
use log::{debug, info, trace};
use std::fmt::Display;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use crate::fanotify::{Decision, Event, EventChannel, EventMask, EventStream};
use crate::models::{ConfigError, FileAccessEvent, MonitorConfiguration, MonitorSummary, OutputFormat};
use crate::monitor::ProcessNames;
use crate::output;

/// Everything the loop needs besides the channel and its sinks
#[derive(Debug, Clone)]
pub struct MonitorContext {
    /// Masks checked independently against each event; one match is enough
    pub interest: Vec<EventMask>,
    /// Events from these process ids are discarded by the channel
    pub skip_pids: Vec<i32>,
    /// Paths matching any of these are not reported
    pub exclude: Vec<glob::Pattern>,
    pub format: OutputFormat,
    pub poll_interval: Duration,
    pub permission_decision: Decision,
    pub show_process: bool,
}

impl MonitorContext {
    pub fn from_configuration(config: &MonitorConfiguration, own_pid: i32) -> Result<Self, ConfigError> {
        let exclude = config
            .exclude
            .iter()
            .map(|pattern| {
                glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidExclude {
                    pattern: pattern.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            interest: config.events.split(),
            skip_pids: config.effective_skip_pids(own_pid),
            exclude,
            format: config.format,
            poll_interval: config.poll_interval,
            permission_decision: config.permission_decision,
            show_process: config.show_process,
        })
    }

    /// Names of the interest masks the event satisfies
    fn classify(&self, event: &Event) -> Vec<String> {
        self.interest
            .iter()
            .filter(|mask| event.matches(**mask))
            .flat_map(|mask| mask.names())
            .map(String::from)
            .collect()
    }

    fn is_excluded(&self, path: &std::path::Path) -> bool {
        self.exclude.iter().any(|pattern| pattern.matches_path(path))
    }
}

/// What one pass through the loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A line was written to the output sink
    Reported,
    /// The event was read but not reported (no interest match, excluded path)
    Filtered,
    /// Nothing to report: self-originated event or empty non-blocking read
    Idle,
    /// A diagnostic was written to the error sink
    Failed,
}

/// The polling loop: pulls events, reports them to `out`, diagnostics to `err`
pub struct Monitor<S, O, E> {
    channel: EventChannel<S>,
    context: MonitorContext,
    out: O,
    err: E,
    processes: Option<ProcessNames>,
    summary: MonitorSummary,
}

impl<S, O, E> Monitor<S, O, E>
where
    S: EventStream,
    O: Write,
    E: Write,
{
    pub fn new(channel: EventChannel<S>, context: MonitorContext, out: O, err: E) -> Self {
        let processes = context.show_process.then(ProcessNames::new);
        Self {
            channel,
            context,
            out,
            err,
            processes,
            summary: MonitorSummary::default(),
        }
    }

    pub fn summary(&self) -> MonitorSummary {
        self.summary
    }

    pub fn output(&self) -> &O {
        &self.out
    }

    pub fn errors(&self) -> &E {
        &self.err
    }

    pub fn into_parts(self) -> (EventChannel<S>, O, E) {
        (self.channel, self.out, self.err)
    }

    /// Runs until `shutdown` is set. Only failures to write to the sinks end
    /// the loop early; every event-level error is reported and skipped.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<MonitorSummary> {
        info!("monitoring loop started");

        while !shutdown.load(Ordering::Relaxed) {
            match self.channel.wait(self.context.poll_interval) {
                Ok(true) => {
                    self.step()?;
                }
                Ok(false) => {}
                Err(err) => {
                    self.report(&err)?;
                    std::thread::sleep(self.context.poll_interval);
                }
            }
        }

        let drained = self.channel.drain();
        if drained > 0 {
            debug!("released {drained} buffered events on shutdown");
        }
        info!("monitoring loop stopped");
        Ok(self.summary)
    }

    /// Pulls and fully processes at most one record
    pub fn step(&mut self) -> Result<StepOutcome> {
        match self.channel.pull(&self.context.skip_pids) {
            Ok(Some(event)) => self.handle_event(event),
            Ok(None) => Ok(StepOutcome::Idle),
            Err(err) => {
                self.report(&err)?;
                Ok(StepOutcome::Failed)
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<StepOutcome> {
        self.summary.events += 1;
        trace!("event pid={} mask={:?}", event.pid(), event.mask());

        if event.is_overflow() {
            let closed = event.close();
            self.report(&"event queue overflowed, events were lost")?;
            if let Err(err) = closed {
                self.report(&err)?;
            }
            return Ok(StepOutcome::Failed);
        }

        // The triggering process stays blocked until it gets a verdict, so
        // answer before any path or process lookup.
        let mut failed = false;
        if event.mask().is_permission() {
            match self
                .channel
                .respond(&event, self.context.permission_decision, false)
            {
                Ok(()) => self.summary.responses += 1,
                Err(err) => {
                    self.report(&err)?;
                    failed = true;
                }
            }
        }

        let described = self.describe(&event);
        let closed = event.close();

        let mut outcome = match described {
            Ok(Some(record)) => {
                output::write_event(&mut self.out, &record, self.context.format)?;
                self.summary.emitted += 1;
                StepOutcome::Reported
            }
            Ok(None) => {
                self.summary.skipped += 1;
                StepOutcome::Filtered
            }
            Err(err) => {
                self.report(&err)?;
                StepOutcome::Failed
            }
        };

        if let Err(err) = closed {
            self.report(&err)?;
            failed = true;
        }
        if failed {
            outcome = StepOutcome::Failed;
        }
        Ok(outcome)
    }

    /// Builds the record to report, or `None` if the event is filtered out
    fn describe(&mut self, event: &Event) -> crate::fanotify::Result<Option<FileAccessEvent>> {
        let matched = self.context.classify(event);
        if matched.is_empty() {
            debug!("pid {} mask {:?} matches no configured event", event.pid(), event.mask());
            return Ok(None);
        }

        let path = event.resolve_path()?;
        if self.context.is_excluded(&path) {
            trace!("excluded {}", path.display());
            return Ok(None);
        }

        let mtime = match self.context.format {
            OutputFormat::Json => event
                .metadata()
                .ok()
                .and_then(|meta| meta.modified().ok())
                .map(output::format_timestamp),
            OutputFormat::Human => None,
        };
        let process = self
            .processes
            .as_mut()
            .and_then(|names| names.lookup(event.pid()));

        Ok(Some(FileAccessEvent {
            timestamp: output::format_timestamp(SystemTime::now()),
            pid: event.pid(),
            path: path.to_string_lossy().into_owned(),
            events: matched,
            process,
            mtime,
        }))
    }

    fn report(&mut self, message: &dyn Display) -> Result<()> {
        self.summary.errors += 1;
        output::write_diagnostic(&mut self.err, message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanotify::EventRecord;
    use std::io::{self, Cursor, Read};

    /// In-memory stream: reads come from `input`, writes land in `written`
    struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(records: &[EventRecord]) -> Self {
            let bytes = records.iter().flat_map(|r| r.encode()).collect();
            Self {
                input: Cursor::new(bytes),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl EventStream for ScriptedStream {
        fn wait_readable(&self, _timeout: Duration) -> io::Result<bool> {
            Ok((self.input.position() as usize) < self.input.get_ref().len())
        }
    }

    fn context() -> MonitorContext {
        MonitorContext::from_configuration(&MonitorConfiguration::default(), std::process::id() as i32)
            .unwrap()
    }

    fn monitor(records: &[EventRecord], context: MonitorContext) -> Monitor<ScriptedStream, Vec<u8>, Vec<u8>> {
        let channel = EventChannel::from_stream(ScriptedStream::new(records));
        Monitor::new(channel, context, Vec::new(), Vec::new())
    }

    fn temp_fd() -> (tempfile::NamedTempFile, i32) {
        use std::os::fd::IntoRawFd;
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let fd = tmp.reopen().unwrap().into_raw_fd();
        (tmp, fd)
    }

    #[test]
    fn test_context_splits_interest_masks() {
        let ctx = context();
        assert_eq!(ctx.interest, vec![EventMask::MODIFY, EventMask::CLOSE_WRITE]);
        assert!(ctx.skip_pids.contains(&(std::process::id() as i32)));
    }

    #[test]
    fn test_reports_matching_event() {
        let (tmp, fd) = temp_fd();
        let record = EventRecord::new(EventMask::CLOSE_WRITE.bits(), fd, 777);
        let mut monitor = monitor(&[record], context());

        assert_eq!(monitor.step().unwrap(), StepOutcome::Reported);
        let out = String::from_utf8(monitor.output().clone()).unwrap();
        let expected = tmp.path().canonicalize().unwrap();
        assert_eq!(out, format!("PID:777 {}\n", expected.display()));
        assert!(monitor.errors().is_empty());
    }

    #[test]
    fn test_unmatched_event_is_filtered() {
        let (_tmp, fd) = temp_fd();
        let record = EventRecord::new(EventMask::OPEN.bits(), fd, 777);
        let mut monitor = monitor(&[record], context());

        assert_eq!(monitor.step().unwrap(), StepOutcome::Filtered);
        assert!(monitor.output().is_empty());
        assert_eq!(monitor.summary().skipped, 1);
    }

    #[test]
    fn test_excluded_path_is_filtered() {
        let (tmp, fd) = temp_fd();
        let record = EventRecord::new(EventMask::MODIFY.bits(), fd, 777);
        let dir = tmp.path().canonicalize().unwrap();
        let dir = dir.parent().unwrap().to_str().unwrap();
        let mut ctx = context();
        ctx.exclude = vec![glob::Pattern::new(&format!("{}/*", glob::Pattern::escape(dir))).unwrap()];
        let mut monitor = monitor(&[record], ctx);

        assert_eq!(monitor.step().unwrap(), StepOutcome::Filtered);
        assert!(monitor.output().is_empty());
    }

    #[test]
    fn test_overflow_is_reported_as_diagnostic() {
        let record = EventRecord::new(EventMask::Q_OVERFLOW.bits(), -1, 0);
        let mut monitor = monitor(&[record], context());

        assert_eq!(monitor.step().unwrap(), StepOutcome::Failed);
        let err = String::from_utf8(monitor.errors().clone()).unwrap();
        assert_eq!(err, "error: event queue overflowed, events were lost\n");
    }

    #[test]
    fn test_read_error_does_not_stop_processing() {
        let mut monitor = monitor(&[], context());
        assert_eq!(monitor.step().unwrap(), StepOutcome::Failed);
        let err = String::from_utf8(monitor.errors().clone()).unwrap();
        assert!(err.starts_with("error: failed to read event record"));
        assert_eq!(monitor.summary().errors, 1);
    }

    #[test]
    fn test_permission_event_gets_response() {
        let (_tmp, fd) = temp_fd();
        let record = EventRecord::new(EventMask::OPEN_PERM.bits(), fd, 777);
        let mut ctx = context();
        ctx.interest = vec![EventMask::OPEN_PERM];
        ctx.permission_decision = Decision::Deny;
        let mut monitor = monitor(&[record], ctx);

        assert_eq!(monitor.step().unwrap(), StepOutcome::Reported);
        assert_eq!(monitor.summary().responses, 1);

        let (channel, _, _) = monitor.into_parts();
        let written = channel.into_inner().written;
        assert_eq!(written.len(), 8);
        assert_eq!(&written[0..4], &fd.to_le_bytes());
        assert_eq!(&written[4..8], &2u32.to_le_bytes());
    }

    #[test]
    fn test_json_output_line() {
        let (_tmp, fd) = temp_fd();
        let record = EventRecord::new((EventMask::MODIFY | EventMask::CLOSE_WRITE).bits(), fd, 55);
        let mut ctx = context();
        ctx.format = OutputFormat::Json;
        let mut monitor = monitor(&[record], ctx);

        assert_eq!(monitor.step().unwrap(), StepOutcome::Reported);
        let out = String::from_utf8(monitor.output().clone()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(value["pid"], 55);
        assert_eq!(value["events"], serde_json::json!(["modify", "close_write"]));
        assert!(value["mtime"].is_string());
    }

    #[test]
    fn test_run_stops_on_shutdown_flag() {
        let shutdown = AtomicBool::new(true);
        let mut monitor = monitor(&[], context());
        let summary = monitor.run(&shutdown).unwrap();
        assert_eq!(summary, MonitorSummary::default());
    }
}
