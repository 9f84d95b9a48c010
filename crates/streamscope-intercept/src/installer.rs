use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use streamscope_types::EventBody;

use crate::console::{Console, InstrumentedConsole};
use crate::emitter::EventEmitter;
use crate::error::{InterceptError, Result};
use crate::event_source::{EventSourceFactory, InstrumentedEventSourceFactory};
use crate::fetch::{FetchPrimitive, InstrumentedFetch};
use crate::readable_stream::{NativeReadableStreams, ReadableStreams, ReaderInterceptor};
use crate::xhr::{InstrumentedXhrFactory, XhrFactory};

pub const INSTALLER_SOURCE: &str = "SSE Viewer";
pub const INSTALLED_MESSAGE: &str = "Interceptors installed successfully";

/// The network primitives a page exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    EventSource,
    ReadableStream,
    XmlHttpRequest,
    Fetch,
    Console,
}

impl Primitive {
    /// Source URL of the `warn` event reported when wrapping this primitive fails.
    pub fn warn_source(&self) -> &'static str {
        match self {
            Primitive::EventSource => "EventSource",
            Primitive::ReadableStream => "getReader-init",
            Primitive::XmlHttpRequest => "xhr-init",
            Primitive::Fetch => "fetch-init",
            Primitive::Console => "console-init",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::EventSource => "EventSource",
            Primitive::ReadableStream => "ReadableStream.getReader",
            Primitive::XmlHttpRequest => "XMLHttpRequest",
            Primitive::Fetch => "fetch",
            Primitive::Console => "console",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A page's global scope: the primitives scripts reach for, plus the install sentinel.
pub struct PageContext {
    pub event_source: Option<Arc<dyn EventSourceFactory>>,
    pub readable_streams: Option<Arc<dyn ReadableStreams>>,
    pub xhr: Option<Arc<dyn XhrFactory>>,
    pub fetch: Option<Arc<dyn FetchPrimitive>>,
    pub console: Option<Arc<dyn Console>>,
    sealed: HashSet<Primitive>,
    installed: bool,
}

impl Default for PageContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PageContext {
    /// A page with only the native `getReader()`; other primitives are added with `with_*`.
    pub fn new() -> Self {
        Self {
            event_source: None,
            readable_streams: Some(Arc::new(NativeReadableStreams)),
            xhr: None,
            fetch: None,
            console: None,
            sealed: HashSet::new(),
            installed: false,
        }
    }

    pub fn with_event_source(mut self, factory: Arc<dyn EventSourceFactory>) -> Self {
        self.event_source = Some(factory);
        self
    }

    pub fn with_readable_streams(mut self, streams: Arc<dyn ReadableStreams>) -> Self {
        self.readable_streams = Some(streams);
        self
    }

    pub fn with_xhr(mut self, factory: Arc<dyn XhrFactory>) -> Self {
        self.xhr = Some(factory);
        self
    }

    pub fn with_fetch(mut self, fetch: Arc<dyn FetchPrimitive>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Make a primitive non-writable; instrumenting it will fail.
    pub fn seal(&mut self, primitive: Primitive) {
        self.sealed.insert(primitive);
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    fn ensure_writable(&self, primitive: Primitive) -> Result<()> {
        if self.sealed.contains(&primitive) {
            return Err(InterceptError::Install {
                primitive: primitive.name(),
                reason: format!("{} is not writable", primitive),
            });
        }
        Ok(())
    }
}

/// Replace `slot`'s primitive with its decorated form, reporting a failure as one `warn` event.
fn wrap<T: ?Sized>(
    page: &PageContext,
    primitive: Primitive,
    slot: Option<Arc<T>>,
    emitter: &EventEmitter,
    decorate: impl FnOnce(Arc<T>) -> Arc<T>,
) -> Option<Arc<T>> {
    let current = slot?;
    match page.ensure_writable(primitive) {
        Ok(()) => {
            tracing::debug!(primitive = %primitive, "intercepted");
            Some(decorate(current))
        }
        Err(e) => {
            tracing::warn!(primitive = %primitive, error = %e, "failed to install interceptor");
            emitter.post(primitive.warn_source(), EventBody::warn(e.to_string()));
            Some(current)
        }
    }
}

/// Wrap every present primitive exactly once per page lifetime.
///
/// Returns `false` if the page was already instrumented. One adapter failing to install
/// does not stop the others.
pub fn install_interceptors(page: &mut PageContext, emitter: &EventEmitter) -> bool {
    if page.installed {
        tracing::warn!("interceptors already installed, skipping");
        return false;
    }
    page.installed = true;

    page.event_source = wrap(
        page,
        Primitive::EventSource,
        page.event_source.clone(),
        emitter,
        |inner| Arc::new(InstrumentedEventSourceFactory::new(inner, emitter.clone())),
    );
    page.readable_streams = wrap(
        page,
        Primitive::ReadableStream,
        page.readable_streams.clone(),
        emitter,
        |inner| Arc::new(ReaderInterceptor::new(inner, emitter.clone())),
    );
    page.xhr = wrap(
        page,
        Primitive::XmlHttpRequest,
        page.xhr.clone(),
        emitter,
        |inner| Arc::new(InstrumentedXhrFactory::new(inner, emitter.clone())),
    );
    page.fetch = wrap(
        page,
        Primitive::Fetch,
        page.fetch.clone(),
        emitter,
        |inner| Arc::new(InstrumentedFetch::new(inner, emitter.clone())),
    );

    tracing::info!("stream interceptors installed");
    emitter.post(INSTALLER_SOURCE, EventBody::init(INSTALLED_MESSAGE));

    page.console = wrap(
        page,
        Primitive::Console,
        page.console.clone(),
        emitter,
        |inner| Arc::new(InstrumentedConsole::new(inner, emitter.clone())),
    );

    true
}
