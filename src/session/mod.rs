//! Sessions.
//!
//! A session carries the call-scoped state of exactly one operation performed
//! with a context: argument overrides, resolved locale and media type, and the
//! warnings raised along the way. Sessions borrow their context, are consumed
//! by the operation they run, and cannot be shared between threads.

mod args;
mod listener;
mod pipe;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use chrono_tz::Tz;
use mime_guess::Mime;
use time::OffsetDateTime;
use tracing::{Span, debug, debug_span, warn};
use uuid::Uuid;

pub use args::SessionArgs;
pub use listener::{ListenerCall, RecordingListener, SessionEvent, SessionListener};
pub use pipe::{InputPipe, OutputPipe};

use crate::context::{Context, Locale};
use crate::error::{PropertyError, SessionError};
use crate::store::{FromPropertyValue, PropertyValue};

/// Result of a completed session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome<R> {
    pub value: R,
    pub warnings: Vec<String>,
    /// Bytes written to or read from the session's pipe.
    pub bytes: u64,
}

/// Call-scoped state for one operation against a context.
pub struct Session<'ctx, T: Context> {
    context: &'ctx T,
    event: SessionEvent,
    properties: BTreeMap<String, PropertyValue>,
    locale: Locale,
    time_zone: Tz,
    media_type: Mime,
    debug: bool,
    listener: Option<Arc<dyn SessionListener>>,
    warnings: RefCell<Vec<String>>,
}

impl<'ctx, T: Context> Session<'ctx, T> {
    pub(crate) fn new(context: &'ctx T, args: SessionArgs) -> Self {
        let settings = context.settings();
        let SessionArgs {
            properties,
            locale,
            time_zone,
            media_type,
            debug,
            listener,
        } = args;

        Self {
            context,
            event: SessionEvent {
                session_id: Uuid::new_v4(),
                context_type: T::TYPE_NAME,
                started_at: OffsetDateTime::now_utc(),
            },
            properties,
            locale: locale.unwrap_or_else(|| settings.locale.clone()),
            time_zone: time_zone.unwrap_or(settings.time_zone),
            media_type: media_type
                .or_else(|| settings.media_type.clone())
                .unwrap_or_else(|| context.default_media_type()),
            debug: debug.unwrap_or(settings.debug),
            listener,
            warnings: RefCell::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.event.session_id
    }

    pub fn context(&self) -> &'ctx T {
        self.context
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn media_type(&self) -> &Mime {
        &self.media_type
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.event.started_at
    }

    /// Session override if present, otherwise the context's value.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .get(name)
            .or_else(|| self.context.property_store().get(name))
    }

    pub fn property_as<V: FromPropertyValue>(&self, name: &str) -> Result<Option<V>, PropertyError> {
        match self.property(name) {
            None => Ok(None),
            Some(value) => V::from_property(value)
                .map(Some)
                .ok_or_else(|| PropertyError::type_mismatch(name, V::EXPECTED, value.kind())),
        }
    }

    pub fn property_or<V: FromPropertyValue>(&self, name: &str, default: V) -> Result<V, PropertyError> {
        Ok(self.property_as(name)?.unwrap_or(default))
    }

    /// Record a non-fatal problem and tell the listener.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        if let Some(listener) = &self.listener {
            listener.on_warning(&self.event, &message);
        }
        debug!(session_id = %self.event.session_id, warning = %message, "Session warning");
        self.warnings.borrow_mut().push(message);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }

    /// Perform an operation that needs no I/O handle.
    pub fn run<R, F>(self, op: F) -> Result<SessionOutcome<R>, SessionError>
    where
        F: FnOnce(&Self) -> Result<R, SessionError>,
    {
        let span = self.span();
        let _entered = span.enter();
        let _end = self.begin();

        let result = op(&self);
        self.complete(result, 0)
    }

    /// Perform an operation writing to `sink`.
    ///
    /// The sink is flushed only when `op` succeeds.
    pub fn write_to<W, R, F>(self, sink: W, op: F) -> Result<SessionOutcome<R>, SessionError>
    where
        W: Write,
        F: FnOnce(&Self, &mut OutputPipe<W>) -> Result<R, SessionError>,
    {
        let span = self.span();
        let _entered = span.enter();
        let _end = self.begin();

        let mut pipe = OutputPipe::new(sink);
        let result = op(&self, &mut pipe).and_then(|value| {
            pipe.finish()?;
            Ok(value)
        });
        let bytes = pipe.bytes_written();
        drop(pipe);

        self.complete(result, bytes)
    }

    /// Perform an operation reading from `source`.
    pub fn read_from<Rd, R, F>(self, source: Rd, op: F) -> Result<SessionOutcome<R>, SessionError>
    where
        Rd: Read,
        F: FnOnce(&Self, &mut InputPipe<Rd>) -> Result<R, SessionError>,
    {
        let span = self.span();
        let _entered = span.enter();
        let _end = self.begin();

        let mut pipe = InputPipe::new(source);
        let result = op(&self, &mut pipe);
        let bytes = pipe.bytes_read();
        drop(pipe);

        self.complete(result, bytes)
    }

    fn span(&self) -> Span {
        debug_span!(
            "session",
            session_id = %self.event.session_id,
            context_type = T::TYPE_NAME
        )
    }

    fn begin(&self) -> EndGuard<'_> {
        debug!(
            locale = %self.locale,
            time_zone = %self.time_zone,
            media_type = %self.media_type,
            "Session started"
        );
        if let Some(listener) = &self.listener {
            listener.on_start(&self.event);
        }
        EndGuard {
            listener: self.listener.as_deref(),
            event: &self.event,
        }
    }

    fn complete<R>(
        &self,
        result: Result<R, SessionError>,
        bytes: u64,
    ) -> Result<SessionOutcome<R>, SessionError> {
        let elapsed = OffsetDateTime::now_utc() - self.event.started_at;
        match result {
            Ok(value) => {
                let warnings = self.warnings.take();
                if self.debug {
                    for warning in &warnings {
                        warn!(warning = %warning, "Session warning");
                    }
                }
                debug!(
                    bytes,
                    warnings = warnings.len(),
                    elapsed = %elapsed,
                    outcome = "ok",
                    "Session finished"
                );
                Ok(SessionOutcome {
                    value,
                    warnings,
                    bytes,
                })
            }
            Err(err) => {
                if let Some(listener) = &self.listener {
                    listener.on_error(&self.event, &err);
                }
                warn!(
                    error = %err,
                    bytes,
                    elapsed = %elapsed,
                    outcome = "error",
                    "Session failed"
                );
                Err(err)
            }
        }
    }
}

/// Delivers `on_end` when the operation's scope exits, unwinding included.
struct EndGuard<'s> {
    listener: Option<&'s dyn SessionListener>,
    event: &'s SessionEvent,
}

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener {
            listener.on_end(self.event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufRead};
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::context::ContextSettings;
    use crate::error::CreateError;
    use crate::store::PropertyStore;

    struct Echo {
        store: PropertyStore,
        settings: ContextSettings,
    }

    impl Context for Echo {
        const TYPE_NAME: &'static str = "Echo";

        fn create(store: &PropertyStore) -> Result<Self, CreateError> {
            Ok(Self {
                store: store.clone(),
                settings: ContextSettings::from_store(store)?,
            })
        }

        fn property_store(&self) -> &PropertyStore {
            &self.store
        }

        fn settings(&self) -> &ContextSettings {
            &self.settings
        }

        fn default_media_type(&self) -> Mime {
            mime_guess::mime::TEXT_PLAIN
        }
    }

    fn echo(pairs: &[(&str, &str)]) -> Echo {
        let store: PropertyStore = pairs.iter().copied().collect();
        Echo::create(&store).expect("valid echo")
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("flush refused"))
        }
    }

    #[test]
    fn args_override_context_settings() {
        let context = echo(&[("Context.locale", "fr-FR"), ("Context.timeZone", "Asia/Tokyo")]);

        let session = context.create_session();
        assert_eq!(session.locale().as_str(), "fr-FR");
        assert_eq!(session.time_zone(), Tz::Asia__Tokyo);
        assert_eq!(session.media_type(), &mime_guess::mime::TEXT_PLAIN);

        let args = SessionArgs::new()
            .locale(Locale::parse("de").expect("valid"))
            .media_type(mime_guess::mime::APPLICATION_JSON)
            .debug(true);
        let session = context.create_session_with(args);
        assert_eq!(session.locale().as_str(), "de");
        assert_eq!(session.time_zone(), Tz::Asia__Tokyo);
        assert_eq!(session.media_type(), &mime_guess::mime::APPLICATION_JSON);
        assert!(session.is_debug());
    }

    #[test]
    fn property_overrides_shadow_context_values() {
        let context = echo(&[("Echo.prefix", ">"), ("Echo.width", "80")]);
        let session = context.create_session_with(SessionArgs::new().property("Echo.width", 40));

        assert_eq!(session.property_as::<i64>("Echo.width").expect("int"), Some(40));
        assert_eq!(session.property_as::<String>("Echo.prefix").expect("str"), Some(">".into()));
        assert_eq!(session.property_or("Echo.missing", 7_i64).expect("default"), 7);
        assert!(context.property_store().get("Echo.width").is_some_and(|v| v.as_str() == Some("80")));
    }

    #[test]
    fn write_to_flushes_and_reports_bytes() {
        let context = echo(&[("Echo.prefix", "> ")]);
        let listener = Arc::new(RecordingListener::new());
        let session = context.create_session_with(SessionArgs::new().listener(listener.clone()));

        let mut out = Vec::new();
        let outcome = session
            .write_to(&mut out, |session, pipe| {
                let prefix = session.property_or("Echo.prefix", String::new())?;
                write!(pipe, "{prefix}hello")?;
                session.warn("trailing newline omitted");
                Ok("done")
            })
            .expect("session succeeds");

        assert_eq!(out, b"> hello");
        assert_eq!(outcome.value, "done");
        assert_eq!(outcome.bytes, 7);
        assert_eq!(outcome.warnings, vec!["trailing newline omitted".to_string()]);
        assert_eq!(
            listener.calls(),
            vec![
                ListenerCall::Start,
                ListenerCall::Warning("trailing newline omitted".into()),
                ListenerCall::End,
            ]
        );
    }

    #[test]
    fn failures_notify_error_then_end() {
        let context = echo(&[]);
        let listener = Arc::new(RecordingListener::new());

        let err = context
            .create_session_with(SessionArgs::new().listener(listener.clone()))
            .write_to(FailingSink, |_, pipe| {
                pipe.write_all(b"partial")?;
                Ok(())
            })
            .expect_err("flush fails");

        assert!(matches!(err, SessionError::Io(_)));
        assert_eq!(
            listener.calls(),
            vec![
                ListenerCall::Start,
                ListenerCall::Error(err.to_string()),
                ListenerCall::End,
            ]
        );
    }

    #[test]
    fn read_from_counts_consumed_input() {
        let context = echo(&[]);
        let outcome = context
            .create_session()
            .read_from(&b"alpha\nbeta\n"[..], |_, pipe| {
                let lines = pipe.lines().collect::<Result<Vec<_>, _>>()?;
                Ok(lines.len())
            })
            .expect("session succeeds");

        assert_eq!(outcome.value, 2);
        assert_eq!(outcome.bytes, 11);
    }

    #[test]
    fn end_is_delivered_when_operation_panics() {
        let context = echo(&[]);
        let listener = Arc::new(RecordingListener::new());
        let session = context.create_session_with(SessionArgs::new().listener(listener.clone()));

        let result = catch_unwind(AssertUnwindSafe(|| {
            session.run(|_| -> Result<(), SessionError> { panic!("operation blew up") })
        }));

        assert!(result.is_err());
        assert_eq!(listener.calls(), vec![ListenerCall::Start, ListenerCall::End]);
    }

    #[test]
    fn aborted_operations_surface_their_reason() {
        let context = echo(&[]);
        let err = context
            .create_session()
            .run(|_| -> Result<(), SessionError> { Err(SessionError::aborted("caller gave up")) })
            .expect_err("aborted");
        assert_eq!(err.to_string(), "session aborted: caller gave up");
    }
}
