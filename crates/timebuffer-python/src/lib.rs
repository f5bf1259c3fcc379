//! Python bindings for timebuffer

use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use std::sync::Arc;
use timebuffer_core::{
    CancelToken as CoreCancelToken, ChannelLayout, Descriptor, OrderingPolicy,
    Payload as CorePayload, Precision, ReaderConfig, ReaderEndpoint, Rect,
    Registry as CoreRegistry, RenderScale, SlotState, WaitStrategy, WriterConfig, WriterEndpoint,
};

create_exception!(timebuffer, TimeBufferError, PyException);
create_exception!(timebuffer, OrderingViolation, TimeBufferError);
create_exception!(timebuffer, Timeout, TimeBufferError);
create_exception!(timebuffer, MissingCounterpart, TimeBufferError);
create_exception!(timebuffer, NameCollision, TimeBufferError);
create_exception!(timebuffer, Cancelled, TimeBufferError);

/// Convert timebuffer error to Python exception
fn to_py_err(e: timebuffer_core::Error) -> PyErr {
    use timebuffer_core::Status;
    let msg = e.to_string();
    match e.status() {
        Status::OrderingViolation => OrderingViolation::new_err(msg),
        Status::Timeout => Timeout::new_err(msg),
        Status::MissingCounterpart => MissingCounterpart::new_err(msg),
        Status::NameCollision => NameCollision::new_err(msg),
        Status::Cancelled => Cancelled::new_err(msg),
        Status::InvalidConfig | Status::Success => PyValueError::new_err(msg),
    }
}

fn parse_policy(policy: &str) -> PyResult<OrderingPolicy> {
    policy.parse().map_err(to_py_err)
}

fn parse_wait(wait: &str) -> PyResult<WaitStrategy> {
    wait.parse().map_err(to_py_err)
}

fn state_tuple(state: SlotState) -> (&'static str, Option<i64>) {
    match state {
        SlotState::Uninit => ("uninit", None),
        SlotState::Primed(g) => ("primed", Some(g)),
        SlotState::Ready(g) => ("ready", Some(g)),
    }
}

/// Python wrapper for Registry
#[pyclass]
struct Registry {
    inner: Arc<CoreRegistry>,
}

#[pymethods]
impl Registry {
    #[new]
    fn new() -> Self {
        Self {
            inner: CoreRegistry::new(),
        }
    }

    /// The process-wide registry
    #[staticmethod]
    fn global() -> Self {
        Self {
            inner: CoreRegistry::global(),
        }
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys().iter().map(|k| k.to_string()).collect()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}

/// Python wrapper for Payload
///
/// 数据在构造时复制，之后不可变
#[pyclass]
#[derive(Clone)]
struct Payload {
    inner: CorePayload,
}

#[pymethods]
impl Payload {
    #[new]
    #[pyo3(signature = (data, bounds, layout="rgba", precision="u8", row_stride=None))]
    fn new(
        data: &[u8],
        bounds: (i32, i32, i32, i32),
        layout: &str,
        precision: &str,
        row_stride: Option<usize>,
    ) -> PyResult<Self> {
        let layout: ChannelLayout = layout.parse().map_err(to_py_err)?;
        let precision: Precision = precision.parse().map_err(to_py_err)?;
        let (x1, y1, x2, y2) = bounds;
        let mut desc = Descriptor::new(Rect::new(x1, y1, x2, y2), layout, precision);
        if let Some(stride) = row_stride {
            desc = desc.with_row_stride(stride);
        }
        let inner = CorePayload::new(desc, data.to_vec()).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn data<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        PyBytes::new(py, self.inner.data())
    }

    #[getter]
    fn bounds(&self) -> (i32, i32, i32, i32) {
        let r = self.inner.descriptor().bounds;
        (r.x1, r.y1, r.x2, r.y2)
    }

    #[getter]
    fn layout(&self) -> &'static str {
        self.inner.descriptor().layout.as_str()
    }

    #[getter]
    fn precision(&self) -> &'static str {
        self.inner.descriptor().precision.as_str()
    }

    #[getter]
    fn row_stride(&self) -> usize {
        self.inner.descriptor().row_stride
    }

    /// (scale_x, scale_y, pixel_aspect)
    #[getter]
    fn render_scale(&self) -> (f64, f64, f64) {
        let s = self.inner.render_scale();
        (s.x, s.y, s.pixel_aspect)
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }
}

/// Python wrapper for CancelToken
#[pyclass]
#[derive(Clone, Default)]
struct CancelToken {
    inner: CoreCancelToken,
}

#[pymethods]
impl CancelToken {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    fn cancel(&self) {
        self.inner.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }
}

/// Python wrapper for ReaderEndpoint
#[pyclass]
struct Reader {
    inner: ReaderEndpoint,
}

#[pymethods]
impl Reader {
    #[new]
    #[pyo3(signature = (registry, scope, name, start_frame=1, policy="error", timeout_ms=0, wait="notify"))]
    fn new(
        registry: PyRef<'_, Registry>,
        scope: &str,
        name: &str,
        start_frame: i64,
        policy: &str,
        timeout_ms: u64,
        wait: &str,
    ) -> PyResult<Self> {
        let config = ReaderConfig::new(name)
            .with_start_frame(start_frame)
            .with_policy(parse_policy(policy)?)
            .with_timeout_ms(timeout_ms)
            .with_wait(parse_wait(wait)?);
        let inner = ReaderEndpoint::new(Arc::clone(&registry.inner), scope, config)
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Payload published for `frame - 1`; releases the GIL while waiting
    #[pyo3(signature = (frame, scale=(1.0, 1.0, 1.0), cancel=None))]
    fn acquire(
        &self,
        py: Python<'_>,
        frame: i64,
        scale: (f64, f64, f64),
        cancel: Option<PyRef<'_, CancelToken>>,
    ) -> PyResult<Payload> {
        let scale = RenderScale::new(scale.0, scale.1, scale.2);
        let token = cancel.map(|c| c.inner.clone());
        let inner = py
            .allow_threads(|| self.inner.acquire(frame, scale, token.as_ref()))
            .map_err(to_py_err)?;
        Ok(Payload { inner })
    }

    fn reset(&self) {
        self.inner.reset();
    }

    fn rename(&mut self, name: &str) -> PyResult<()> {
        self.inner.rename(name).map_err(to_py_err)
    }

    /// "error" | "black" | "last"
    #[getter]
    fn policy(&self) -> &'static str {
        self.inner.config().policy.as_str()
    }

    #[setter]
    fn set_policy(&mut self, policy: &str) -> PyResult<()> {
        self.inner.set_policy(parse_policy(policy)?);
        Ok(())
    }

    #[getter]
    fn timeout_ms(&self) -> u64 {
        self.inner.config().timeout_ms
    }

    #[setter]
    fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.inner.set_timeout_ms(timeout_ms);
    }

    #[getter]
    fn start_frame(&self) -> i64 {
        self.inner.config().start_frame
    }

    #[setter]
    fn set_start_frame(&mut self, start_frame: i64) {
        self.inner.set_start_frame(start_frame);
    }

    /// "notify" | "poll"
    #[getter]
    fn wait(&self) -> &'static str {
        self.inner.config().wait.as_str()
    }

    #[setter]
    fn set_wait(&mut self, wait: &str) -> PyResult<()> {
        self.inner.set_wait(parse_wait(wait)?);
        Ok(())
    }

    #[getter]
    fn key(&self) -> String {
        self.inner.key().to_string()
    }

    /// ("uninit" | "primed" | "ready", generation), or None while unbound
    fn state(&self) -> Option<(&'static str, Option<i64>)> {
        self.inner.state().map(state_tuple)
    }

    fn has_counterpart(&self) -> bool {
        self.inner.has_counterpart()
    }
}

/// Python wrapper for WriterEndpoint
#[pyclass]
struct Writer {
    inner: WriterEndpoint,
}

#[pymethods]
impl Writer {
    #[new]
    fn new(registry: PyRef<'_, Registry>, scope: &str, name: &str) -> PyResult<Self> {
        let inner = WriterEndpoint::new(Arc::clone(&registry.inner), scope, WriterConfig::new(name))
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[pyo3(signature = (frame, payload, scale=(1.0, 1.0, 1.0)))]
    fn publish(
        &self,
        frame: i64,
        payload: PyRef<'_, Payload>,
        scale: (f64, f64, f64),
    ) -> PyResult<()> {
        let scale = RenderScale::new(scale.0, scale.1, scale.2);
        self.inner
            .publish(frame, payload.inner.clone(), scale)
            .map_err(to_py_err)
    }

    fn rename(&mut self, name: &str) -> PyResult<()> {
        self.inner.rename(name).map_err(to_py_err)
    }

    #[getter]
    fn key(&self) -> String {
        self.inner.key().to_string()
    }

    fn has_counterpart(&self) -> bool {
        self.inner.has_counterpart()
    }
}

#[pymodule]
fn timebuffer(py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Registry>()?;
    m.add_class::<Payload>()?;
    m.add_class::<CancelToken>()?;
    m.add_class::<Reader>()?;
    m.add_class::<Writer>()?;
    m.add("TimeBufferError", py.get_type::<TimeBufferError>())?;
    m.add("OrderingViolation", py.get_type::<OrderingViolation>())?;
    m.add("Timeout", py.get_type::<Timeout>())?;
    m.add("MissingCounterpart", py.get_type::<MissingCounterpart>())?;
    m.add("NameCollision", py.get_type::<NameCollision>())?;
    m.add("Cancelled", py.get_type::<Cancelled>())?;
    Ok(())
}
