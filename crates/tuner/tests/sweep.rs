//! End-to-end sweep tests against a scripted in-memory backend.

use gridtune_backend::{
    BackendError, BackendKind, BlockDim, DeviceArg, DeviceBackend, GridDim, KernelArg,
    KernelHandle,
};
use gridtune_space::{Configuration, ParameterDomain};
use gridtune_tuner::{KernelInvocation, ProblemSize, Tuner, TuneOptions};
use std::cell::RefCell;
use std::rc::Rc;

/// A deterministic backend whose compile/launch failures, kernel effects,
/// and timings are scripted by the test.
struct ScriptedBackend {
    max_threads: usize,
    staged: Vec<KernelArg>,
    kernels: Vec<String>,
    /// Fail compilation with this message when the kernel name contains the
    /// needle.
    compile_fail: Option<(&'static str, &'static str)>,
    /// Fail launches (runs and benchmarks) the same way.
    launch_fail: Option<(&'static str, &'static str)>,
    time_for: Box<dyn Fn(&str) -> f64>,
    on_run: Box<dyn FnMut(&str, &mut [KernelArg])>,
    compile_log: Rc<RefCell<Vec<(String, String)>>>,
}

fn scripted() -> ScriptedBackend {
    ScriptedBackend {
        max_threads: 1024,
        staged: Vec::new(),
        kernels: Vec::new(),
        compile_fail: None,
        launch_fail: None,
        time_for: Box::new(|_| 1.0),
        on_run: Box::new(|_, _| {}),
        compile_log: Rc::new(RefCell::new(Vec::new())),
    }
}

impl ScriptedBackend {
    fn kernel_name(&self, kernel: KernelHandle) -> Result<String, BackendError> {
        self.kernels
            .get(kernel.0)
            .cloned()
            .ok_or_else(|| BackendError::InvalidArgument("unknown kernel handle".into()))
    }

    fn check_launch(&self, name: &str) -> Result<(), BackendError> {
        if let Some((needle, message)) = self.launch_fail {
            if name.contains(needle) {
                return Err(BackendError::Launch(message.to_string()));
            }
        }
        Ok(())
    }
}

impl DeviceBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn max_threads(&self) -> usize {
        self.max_threads
    }

    fn ready_argument_list(&mut self, args: &[KernelArg]) -> Result<Vec<DeviceArg>, BackendError> {
        self.staged = args.to_vec();
        Ok(args
            .iter()
            .enumerate()
            .map(|(slot, arg)| {
                if arg.is_buffer() {
                    DeviceArg::Buffer {
                        slot,
                        size_bytes: arg.size_bytes(),
                    }
                } else {
                    DeviceArg::Scalar(arg.clone())
                }
            })
            .collect())
    }

    fn compile(&mut self, kernel_name: &str, source: &str) -> Result<KernelHandle, BackendError> {
        if let Some((needle, message)) = self.compile_fail {
            if kernel_name.contains(needle) {
                return Err(BackendError::Compile(message.to_string()));
            }
        }
        self.compile_log
            .borrow_mut()
            .push((kernel_name.to_string(), source.to_string()));
        self.kernels.push(kernel_name.to_string());
        Ok(KernelHandle(self.kernels.len() - 1))
    }

    fn run_kernel(
        &mut self,
        kernel: KernelHandle,
        _args: &[DeviceArg],
        _threads: BlockDim,
        _grid: GridDim,
    ) -> Result<(), BackendError> {
        let name = self.kernel_name(kernel)?;
        self.check_launch(&name)?;
        let Self { on_run, staged, .. } = self;
        on_run(&name, staged);
        Ok(())
    }

    fn benchmark(
        &mut self,
        kernel: KernelHandle,
        _args: &[DeviceArg],
        _threads: BlockDim,
        _grid: GridDim,
        iterations: usize,
    ) -> Result<Vec<f64>, BackendError> {
        let name = self.kernel_name(kernel)?;
        self.check_launch(&name)?;
        Ok(vec![(self.time_for)(&name); iterations])
    }

    fn memset_zero(&mut self, arg: &DeviceArg) -> Result<(), BackendError> {
        if let DeviceArg::Buffer { slot, .. } = arg {
            self.staged[*slot] = self.staged[*slot].zeros_like();
        }
        Ok(())
    }

    fn memcpy_dtoh(&mut self, dest: &mut KernelArg, src: &DeviceArg) -> Result<(), BackendError> {
        match src {
            DeviceArg::Buffer { slot, .. } => *dest = self.staged[*slot].clone(),
            DeviceArg::Scalar(value) => *dest = value.clone(),
        }
        Ok(())
    }
}

fn invocation() -> KernelInvocation {
    KernelInvocation::new(
        "k",
        "void k(float *c, float *a, float *b, int n) {}",
        ProblemSize::new(256, 1),
        vec![
            KernelArg::Float32Buffer(vec![0.0; 4]),
            KernelArg::Float32Buffer(vec![1.0, 2.0, 3.0, 4.0]),
            KernelArg::Float32Buffer(vec![4.0, 5.0, 6.0, 7.0]),
            KernelArg::Uint32(4),
        ],
    )
}

/// Accumulates `c[i] += a[i] + b[i]`, so a result is only correct when the
/// output buffer was zeroed beforehand.
fn vector_add_sim() -> Box<dyn FnMut(&str, &mut [KernelArg])> {
    Box::new(|_, staged| {
        let a = match &staged[1] {
            KernelArg::Float32Buffer(v) => v.clone(),
            _ => return,
        };
        let b = match &staged[2] {
            KernelArg::Float32Buffer(v) => v.clone(),
            _ => return,
        };
        if let KernelArg::Float32Buffer(c) = &mut staged[0] {
            for i in 0..c.len() {
                c[i] += a[i] + b[i];
            }
        }
    })
}

fn tuner_with(backend: ScriptedBackend) -> Tuner {
    Tuner::with_backend(BackendKind::Host, Box::new(backend))
}

#[test]
fn test_sweep_records_every_configuration_in_product_order() {
    let domain = ParameterDomain::new().param("a", [1, 2]).param("b", [3, 4]);
    let mut tuner = tuner_with(scripted());
    let results = tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap();
    let instances: Vec<&str> = results.iter().map(|r| r.instance.as_str()).collect();
    assert_eq!(instances, ["1_3", "1_4", "2_3", "2_4"]);
}

#[test]
fn test_excessive_thread_count_is_skipped_not_fatal() {
    let domain = ParameterDomain::new().param("block_size_x", [64, 2048]);
    let mut tuner = tuner_with(scripted());
    let results = tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap();
    assert!(results.get("64").is_some());
    assert!(results.get("2048").is_none());
    assert_eq!(results.len(), 1);
}

#[test]
fn test_restrictions_prune_before_any_compilation() {
    let backend = scripted();
    let compile_log = Rc::clone(&backend.compile_log);
    let domain = ParameterDomain::new().param("x", [1, 2, 3]);
    let options = TuneOptions::default().with_restrictions(["x>1"]);
    let mut tuner = tuner_with(backend);
    let results = tuner.tune(&invocation(), &domain, &options).unwrap();

    let instances: Vec<&str> = results.iter().map(|r| r.instance.as_str()).collect();
    assert_eq!(instances, ["2", "3"]);
    let compiled: Vec<String> = compile_log.borrow().iter().map(|(n, _)| n.clone()).collect();
    assert_eq!(compiled, ["k_2", "k_3"]);
}

#[test]
fn test_specialized_source_carries_defines_and_renamed_kernel() {
    let backend = scripted();
    let compile_log = Rc::clone(&backend.compile_log);
    let domain = ParameterDomain::new().param("block_size_x", [64]);
    let mut tuner = tuner_with(backend);
    tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap();

    let log = compile_log.borrow();
    let (name, source) = &log[0];
    assert_eq!(name, "k_64");
    let lines: Vec<&str> = source.lines().collect();
    // 256 problem elements divided by block_size_x=64 via the implicit
    // grid_div_x default.
    assert_eq!(lines[0], "#define grid_size_x 4");
    assert_eq!(lines[1], "#define grid_size_y 1");
    assert_eq!(lines[2], "#define block_size_x 64");
    assert!(source.contains("void k_64("));
    assert!(!source.contains("void k("));
}

#[test]
fn test_recoverable_compile_failure_skips_configuration() {
    let mut backend = scripted();
    backend.compile_fail = Some(("k_128", "ptxas: entry uses too much shared data"));
    let domain = ParameterDomain::new().param("block_size_x", [64, 128]);
    let mut tuner = tuner_with(backend);
    let results = tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap();
    let instances: Vec<&str> = results.iter().map(|r| r.instance.as_str()).collect();
    assert_eq!(instances, ["64"]);
}

#[test]
fn test_unrecognized_compile_failure_aborts_with_instance() {
    let mut backend = scripted();
    backend.compile_fail = Some(("k_128", "unexpected token at line 2"));
    let domain = ParameterDomain::new().param("block_size_x", [64, 128]);
    let mut tuner = tuner_with(backend);
    let err = tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap_err();
    let message = format!("{err:?}");
    assert!(message.contains("128"), "{message}");
    assert!(message.contains("unexpected token"), "{message}");
}

#[test]
fn test_recoverable_launch_failure_skips_configuration() {
    let mut backend = scripted();
    backend.launch_fail = Some(("k_128", "clEnqueueNDRangeKernel: OUT_OF_RESOURCES"));
    let domain = ParameterDomain::new().param("block_size_x", [64, 128]);
    let mut tuner = tuner_with(backend);
    let results = tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap();
    let instances: Vec<&str> = results.iter().map(|r| r.instance.as_str()).collect();
    assert_eq!(instances, ["64"]);
}

#[test]
fn test_unrecognized_launch_failure_aborts_with_instance() {
    let mut backend = scripted();
    backend.launch_fail = Some(("k_128", "invalid device pointer"));
    let domain = ParameterDomain::new().param("block_size_x", [64, 128]);
    let mut tuner = tuner_with(backend);
    let err = tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap_err();
    let message = format!("{err:?}");
    assert!(message.contains("error while benchmarking"), "{message}");
    assert!(message.contains("128"), "{message}");
}

#[test]
fn test_correct_kernel_passes_verification() {
    let mut backend = scripted();
    backend.on_run = vector_add_sim();
    let domain = ParameterDomain::new().param("block_size_x", [64]);
    let options = TuneOptions::default().with_answer(vec![
        Some(KernelArg::Float32Buffer(vec![5.0, 7.0, 9.0, 11.0])),
        None,
        None,
        None,
    ]);
    let mut tuner = tuner_with(backend);
    let results = tuner.tune(&invocation(), &domain, &options).unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn test_verifier_zeroes_output_buffers_before_running() {
    let mut backend = scripted();
    backend.on_run = vector_add_sim();
    let domain = ParameterDomain::new().param("block_size_x", [64]);
    // Stage garbage in the output buffer; the accumulating kernel only
    // produces the expected answer if the verifier zeroes it first.
    let mut invocation = invocation();
    invocation.arguments[0] = KernelArg::Float32Buffer(vec![9.9; 4]);
    let options = TuneOptions::default().with_answer(vec![
        Some(KernelArg::Float32Buffer(vec![5.0, 7.0, 9.0, 11.0])),
        None,
        None,
        None,
    ]);
    let mut tuner = tuner_with(backend);
    assert!(tuner.tune(&invocation, &domain, &options).is_ok());
}

#[test]
fn test_wrong_kernel_fails_verification_fatally() {
    // The scripted kernel does nothing, so the zeroed output never matches.
    let backend = scripted();
    let domain = ParameterDomain::new().param("block_size_x", [64]);
    let options = TuneOptions::default().with_answer(vec![
        Some(KernelArg::Float32Buffer(vec![5.0, 7.0, 9.0, 11.0])),
        None,
        None,
        None,
    ]);
    let mut tuner = tuner_with(backend);
    let err = tuner.tune(&invocation(), &domain, &options).unwrap_err();
    let message = format!("{err:?}");
    assert!(message.contains("failed correctness check"), "{message}");
    assert!(message.contains("64"), "{message}");
}

#[test]
fn test_answer_length_mismatch_is_fatal() {
    let domain = ParameterDomain::new().param("block_size_x", [64]);
    let options =
        TuneOptions::default().with_answer(vec![Some(KernelArg::Float32Buffer(vec![0.0; 4]))]);
    let mut tuner = tuner_with(scripted());
    let err = tuner.tune(&invocation(), &domain, &options).unwrap_err();
    assert!(format!("{err}").contains("answer"));
}

#[test]
fn test_best_configuration_has_minimum_time() {
    let mut backend = scripted();
    backend.time_for = Box::new(|name| match name {
        "k_64" => 2.0,
        "k_128" => 1.0,
        _ => 3.0,
    });
    let domain = ParameterDomain::new().param("block_size_x", [64, 128, 256]);
    let mut tuner = tuner_with(backend);
    let results = tuner
        .tune(&invocation(), &domain, &TuneOptions::default())
        .unwrap();
    let best = results.best().unwrap();
    assert_eq!(best.instance, "128");
    assert_eq!(best.time_ms, 1.0);
}

#[test]
fn test_sweep_with_everything_pruned_reports_no_results() {
    let domain = ParameterDomain::new().param("x", [1, 2]);
    let options = TuneOptions::default().with_restrictions(["x>10"]);
    let mut tuner = tuner_with(scripted());
    let results = tuner.tune(&invocation(), &domain, &options).unwrap();
    assert!(results.is_empty());
    assert!(results.best().is_none());
}

#[test]
fn test_sweep_key_set_is_idempotent() {
    let sweep = || {
        let mut tuner = tuner_with(scripted());
        let domain = ParameterDomain::new()
            .param("block_size_x", [64, 128])
            .param("tile", [1, 2]);
        let results = tuner
            .tune(&invocation(), &domain, &TuneOptions::default())
            .unwrap();
        results
            .iter()
            .map(|r| r.instance.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(sweep(), sweep());
}

#[test]
fn test_run_once_returns_post_execution_values() {
    let mut backend = scripted();
    backend.on_run = vector_add_sim();
    let compile_log = Rc::clone(&backend.compile_log);
    let config = Configuration::from_pairs([("block_size_x", 64)]);
    let mut tuner = tuner_with(backend);
    let outputs = tuner
        .run_once(&invocation(), &config, &TuneOptions::default())
        .unwrap();

    assert_eq!(
        outputs[0],
        KernelArg::Float32Buffer(vec![5.0, 7.0, 9.0, 11.0])
    );
    // Inputs come back unchanged; scalars pass through.
    assert_eq!(outputs[1], KernelArg::Float32Buffer(vec![1.0, 2.0, 3.0, 4.0]));
    assert_eq!(outputs[3], KernelArg::Uint32(4));
    // One-shot runs keep the kernel's declared name.
    assert_eq!(compile_log.borrow()[0].0, "k");
}
