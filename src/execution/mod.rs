//! Execution path dispatch.
//!
//! `run` takes any `AnalyticOperation` down one of three paths. `Software`
//! runs the portable pipeline, `Hardware` submits a descriptor to the context's
//! accelerator, and `Auto` tries the accelerator and falls back to software on
//! any non-ok status. Whether the fallback sees pristine streams or the state a
//! failed device left behind is decided by the context's `FallbackPolicy`.

pub mod hardware;

use crate::analytics::{AnalyticOperation, AnalyticOperationResult};
use crate::config::{EngineConfig, ExecutionPath, FallbackPolicy};
use crate::kernels::KernelDispatcher;

pub use hardware::{
    Accelerator, AnalyticsDescriptor, CompletionRecord, DescriptorFlags, DescriptorParams, NoAccelerator,
    Opcode, OutputDescriptor, SourceDescriptor,
};

static NO_ACCELERATOR: NoAccelerator = NoAccelerator;

/// Everything a run needs besides the operation itself.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'d> {
    pub dispatcher: &'d KernelDispatcher,
    pub accelerator: &'d dyn Accelerator,
    pub fallback_policy: FallbackPolicy,
    pub numa_node: Option<u32>,
}

impl ExecutionContext<'static> {
    /// The global dispatcher, no accelerator, default policy.
    pub fn new() -> Self {
        Self {
            dispatcher: KernelDispatcher::global(),
            accelerator: &NO_ACCELERATOR,
            fallback_policy: FallbackPolicy::default(),
            numa_node: None,
        }
    }
}

impl Default for ExecutionContext<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> ExecutionContext<'d> {
    pub fn with_accelerator(mut self, accelerator: &'d dyn Accelerator) -> Self {
        self.accelerator = accelerator;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: &'d KernelDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback_policy = policy;
        self
    }

    /// Applies the engine-level settings that concern execution.
    pub fn configured(mut self, config: &EngineConfig) -> Self {
        self.fallback_policy = config.fallback_policy;
        self.numa_node = config.numa_node;
        self
    }
}

/// Runs `op` on `path`.
pub fn run<'a, O>(path: ExecutionPath, ctx: &ExecutionContext<'_>, op: &mut O) -> AnalyticOperationResult
where
    O: AnalyticOperation<'a> + ?Sized,
{
    log::info!("{}: running on the {:?} path", op.name(), path);
    match path {
        ExecutionPath::Software => op.run_software(ctx.dispatcher),
        ExecutionPath::Hardware => run_hardware(ctx, op),
        ExecutionPath::Auto => run_auto(ctx, op),
    }
}

fn run_hardware<'a, O>(ctx: &ExecutionContext<'_>, op: &mut O) -> AnalyticOperationResult
where
    O: AnalyticOperation<'a> + ?Sized,
{
    let mut descriptor = op.descriptor();
    descriptor.numa_node = ctx.numa_node;

    let record = match ctx.accelerator.submit(&descriptor, op.destination_mut()) {
        Ok(record) => record,
        Err(err) => return AnalyticOperationResult::failed(err),
    };
    if !record.is_ok() {
        if let Err(err) = op.apply_hardware_progress(&record) {
            log::debug!("{}: could not apply device progress: {}", op.name(), err);
        }
    }
    record.into_result()
}

fn run_auto<'a, O>(ctx: &ExecutionContext<'_>, op: &mut O) -> AnalyticOperationResult
where
    O: AnalyticOperation<'a> + ?Sized,
{
    let hardware = run_hardware(ctx, op);
    let err = match hardware.status {
        Ok(()) => return hardware,
        Err(err) => err,
    };
    log::warn!(
        "{}: hardware path failed ({}), falling back to software with {:?}",
        op.name(),
        err,
        ctx.fallback_policy
    );
    if ctx.fallback_policy == FallbackPolicy::RewindStreams {
        op.rewind();
    }
    op.run_software(ctx.dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{OperationOptions, Scan};
    use crate::config::{Comparison, OutputBitWidth};
    use crate::error::AnalyticsError;
    use crate::streams::{InputStream, OutputStream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every job after pretending to have consumed some input.
    struct FlakyDevice {
        consumed: usize,
        calls: AtomicUsize,
    }

    impl Accelerator for FlakyDevice {
        fn submit(
            &self,
            descriptor: &AnalyticsDescriptor<'_>,
            _destination: &mut [u8],
        ) -> Result<CompletionRecord, AnalyticsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(descriptor.opcode, Opcode::Scan);
            assert_eq!(descriptor.numa_node, Some(3));
            Ok(CompletionRecord {
                status: AnalyticsError::Status(0x5A).status_code(),
                bytes_consumed: self.consumed,
                ..Default::default()
            })
        }
    }

    /// Writes a fixed answer and reports success.
    struct PerfectDevice;

    impl Accelerator for PerfectDevice {
        fn submit(
            &self,
            _descriptor: &AnalyticsDescriptor<'_>,
            destination: &mut [u8],
        ) -> Result<CompletionRecord, AnalyticsError> {
            destination[0] = 0xA5;
            Ok(CompletionRecord { output_bytes: 1, output_elements: 8, ..Default::default() })
        }
    }

    fn scan_all_set<'a>(source: &'a [u8], dest: &'a mut [u8]) -> Scan<'a> {
        let input = InputStream::builder(source).build().unwrap();
        let output = OutputStream::builder(dest).bit_format(OutputBitWidth::Nominal, 1).build().unwrap();
        Scan::new(input, output, Comparison::Ge, 0, 0, OperationOptions::default()).unwrap()
    }

    #[test]
    fn test_software_path() {
        let source = [1u8, 2, 3, 4];
        let mut dest = [0u8; 1];
        let mut op = scan_all_set(&source, &mut dest);
        let result = run(ExecutionPath::Software, &ExecutionContext::new(), &mut op);
        assert!(result.is_ok());
        assert_eq!(result.output_bytes, 1);
        assert_eq!(result.last_bit_offset, 4);
        drop(op);
        assert_eq!(dest[0], 0x0F);
    }

    #[test]
    fn test_hardware_path_without_device() {
        let source = [1u8, 2];
        let mut dest = [0u8; 1];
        let mut op = scan_all_set(&source, &mut dest);
        let result = run(ExecutionPath::Hardware, &ExecutionContext::new(), &mut op);
        assert_eq!(result.status, Err(AnalyticsError::HardwareNotSupported));
    }

    #[test]
    fn test_hardware_success_is_returned_as_is() {
        let source = [1u8, 2];
        let mut dest = [0u8; 1];
        let device = PerfectDevice;
        let ctx = ExecutionContext::new().with_accelerator(&device);
        let mut op = scan_all_set(&source, &mut dest);
        let result = run(ExecutionPath::Auto, &ctx, &mut op);
        assert!(result.is_ok());
        assert_eq!(result.output_elements, 8);
        drop(op);
        assert_eq!(dest[0], 0xA5);
    }

    #[test]
    fn test_auto_rewinds_before_fallback() {
        let source = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut dest = [0u8; 1];
        let device = FlakyDevice { consumed: 4, calls: AtomicUsize::new(0) };
        let mut ctx = ExecutionContext::new().with_accelerator(&device);
        ctx.numa_node = Some(3);
        let mut op = scan_all_set(&source, &mut dest);
        let result = run(ExecutionPath::Auto, &ctx, &mut op);
        assert!(result.is_ok());
        assert_eq!(result.aggregates.sum, 8);
        assert_eq!(device.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_auto_reuse_sees_device_progress() {
        let source = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut dest = [0u8; 1];
        let device = FlakyDevice { consumed: 4, calls: AtomicUsize::new(0) };
        let mut ctx = ExecutionContext::new()
            .with_accelerator(&device)
            .with_fallback_policy(FallbackPolicy::ReuseStreams);
        ctx.numa_node = Some(3);
        let mut op = scan_all_set(&source, &mut dest);
        let result = run(ExecutionPath::Auto, &ctx, &mut op);
        assert!(result.is_ok());
        assert_eq!(result.aggregates.sum, 4);
        assert_eq!(result.output_elements, 4);
    }
}
