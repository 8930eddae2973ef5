//! End-to-end forward passes through residual blocks.

use rand::{rngs::StdRng, SeedableRng};
use resgraph::nn::{
    BatchNorm, Conv2d, Conv2dConfig, Linear, Module, ReLU, Residual, ResidualError, Sequential,
};
use resgraph::tensor::{Tensor, TensorError, TensorResult, DEFAULT_TOLERANCE};
use std::rc::Rc;
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_close(actual: &Tensor, expected: &Tensor) {
    assert_eq!(actual.shape(), expected.shape(), "shape mismatch");
    assert!(
        actual.all_close(expected, DEFAULT_TOLERANCE),
        "tensors differ:\nactual = {}\nexpected = {}",
        actual,
        expected
    );
}

/// Fails on every call.
struct Exploding;

impl Module for Exploding {
    fn forward(&self, _input: &Tensor) -> TensorResult<Tensor> {
        Err(TensorError::ComputationError("exploded".to_string()))
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}

/// Returns the same tensor whatever the input.
struct Constant(Tensor);

impl Module for Constant {
    fn forward(&self, _input: &Tensor) -> TensorResult<Tensor> {
        Ok(self.0.clone())
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }
}

#[test]
fn test_no_shortcuts_matches_sequential() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0);
    let l1 = Rc::new(Linear::new(6, 5, &mut rng));
    let l2 = Rc::new(Linear::new(5, 3, &mut rng));

    let mut builder = Residual::builder();
    builder.add(l1.clone());
    builder.add(ReLU);
    builder.add(l2.clone());
    let block = builder.build();

    let mut sequential = Sequential::new();
    sequential.add(l1);
    sequential.add(ReLU);
    sequential.add(l2);

    let x = Tensor::random_uniform(&[4, 6], -1.0, 1.0, &mut rng);
    assert_eq!(block.forward(&x).unwrap(), sequential.forward(&x).unwrap());
}

#[test]
fn test_resnet_basic_block() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(1);
    let conv = Arc::new(Conv2d::new(
        Conv2dConfig::new(3, 3, (3, 3)).with_padding((1, 1)),
        &mut rng,
    ));
    let bn = Arc::new(BatchNorm::new(3));

    let mut builder = Residual::builder();
    builder.add(conv.clone());
    builder.add(bn.clone());
    builder.add(ReLU);
    builder.add_shortcut(1, 3).unwrap();
    let block = builder.build();

    let x = Tensor::random_uniform(&[2, 3, 5, 5], -1.0, 1.0, &mut rng);
    let c = conv.forward(&x).unwrap();
    let expected = bn.forward(&c).unwrap().add(&c).unwrap().relu();
    assert_close(&block.forward(&x).unwrap(), &expected);
}

#[test]
fn test_several_shortcuts_sum_in_registration_order() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(2);
    let m1 = Rc::new(Linear::new(4, 4, &mut rng));
    let m2 = Rc::new(Linear::new(4, 4, &mut rng));
    let m3 = Rc::new(Linear::new(4, 4, &mut rng));

    let mut builder = Residual::builder();
    builder.add(m1.clone());
    builder.add(m2.clone());
    builder.add(m3.clone());
    // Into slot 4 the later source is registered first.
    builder.add_shortcut(2, 4).unwrap();
    builder.add_shortcut(1, 3).unwrap();
    builder.add_shortcut(1, 4).unwrap();
    let block = builder.build();

    let x = Tensor::random_uniform(&[3, 4], -1.0, 1.0, &mut rng);
    let o1 = m1.forward(&x).unwrap();
    let o2 = m2.forward(&o1).unwrap();
    let o3 = m3.forward(&o2.add(&o1).unwrap()).unwrap();
    let expected = o3.add(&o2).unwrap().add(&o1).unwrap();
    assert_eq!(block.forward(&x).unwrap(), expected);
}

#[test]
fn test_projected_shortcuts_and_scales() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(3);
    let linear1 = Rc::new(Linear::new(12, 8, &mut rng));
    let linear2 = Rc::new(Linear::new(8, 4, &mut rng));
    let linear3 = Rc::new(Linear::new(4, 4, &mut rng));
    let proj1 = Rc::new(Linear::new(8, 4, &mut rng));
    let proj2 = Rc::new(Linear::new(12, 4, &mut rng));

    let mut builder = Residual::builder();
    builder.add(linear1.clone());
    builder.add(ReLU);
    builder.add(linear2.clone());
    builder.add_scale(3, 0.3).unwrap();
    builder.add(ReLU);
    builder.add_projected_shortcut(1, 4, proj1.clone()).unwrap();
    builder.add_scale(4, 0.24).unwrap();
    builder.add(linear3.clone());
    builder.add_projected_shortcut(0, 5, proj2.clone()).unwrap();
    builder.add_scale(5, 0.5).unwrap();
    builder.add(ReLU);
    builder.add_shortcut(5, 7).unwrap();
    let block = builder.build();

    let x = Tensor::random_uniform(&[4, 3, 12], 0.0, 1.0, &mut rng);

    let o1 = linear1.forward(&x).unwrap();
    let o2 = o1.relu();
    let o3 = linear2.forward(&o2.scale(0.3)).unwrap();
    let o4 = o3.add(&proj1.forward(&o1).unwrap()).unwrap().scale(0.24).relu();
    let o5 = linear3
        .forward(&o4.add(&proj2.forward(&x).unwrap()).unwrap().scale(0.5))
        .unwrap();
    let expected = o5.relu().add(&o5).unwrap();

    let output = block.forward(&x).unwrap();
    assert_eq!(output.shape(), &[4, 3, 4]);
    assert_close(&output, &expected);
}

#[test]
fn test_invalid_shortcut_leaves_block_unchanged() {
    let mut builder = Residual::builder();
    for _ in 0..5 {
        builder.add(ReLU);
    }
    let err = builder.add_shortcut(3, 2).unwrap_err();
    assert_eq!(err, ResidualError::InvalidShortcut { from: 3, to: 2, num_modules: 5 });
    assert!(builder.add_shortcut(0, 7).is_err());
    assert!(builder.add_scale(0, 2.0).is_err());
    assert!(builder.add_scale(7, 2.0).is_err());
    assert_eq!(builder.num_shortcuts(), 0);
    assert_eq!(builder.num_scales(), 0);

    let block = builder.build();
    let x = Tensor::from_shape_vec(&[1, 3], vec![-1.0, 0.0, 2.0]).unwrap();
    assert_eq!(block.forward(&x).unwrap(), x.relu());
}

#[test]
fn test_later_scale_replaces_earlier_one() {
    let mut builder = Residual::builder();
    builder.add(ReLU);
    assert_eq!(builder.add_scale(2, 3.0).unwrap(), None);
    assert_eq!(builder.add_scale(2, 0.5).unwrap(), Some(3.0));
    let block = builder.build();

    let x = Tensor::full(&[2, 2], 4.0);
    assert_eq!(block.forward(&x).unwrap(), Tensor::full(&[2, 2], 2.0));
}

#[test]
fn test_empty_block_with_terminal_shortcut() {
    let mut builder = Residual::builder();
    builder.add_shortcut(0, 1).unwrap();
    builder.add_scale(1, 0.25).unwrap();
    let block = builder.build();
    assert_eq!(block.output_slot(), 1);

    let x = Tensor::full(&[3], 2.0);
    assert_eq!(block.forward(&x).unwrap(), Tensor::full(&[3], 1.0));
}

#[test]
fn test_forward_is_repeatable() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut builder = Residual::builder();
    builder.add(Linear::new(5, 5, &mut rng));
    builder.add(ReLU);
    builder.add_shortcut(0, 3).unwrap();
    let block = builder.build();

    let x = Tensor::random_uniform(&[2, 5], -1.0, 1.0, &mut rng);
    assert_eq!(block.forward(&x).unwrap(), block.forward(&x).unwrap());
}

#[test]
fn test_module_errors_pass_through_unchanged() {
    init_logger();
    let mut builder = Residual::builder();
    builder.add(ReLU);
    builder.add(Exploding);
    builder.add_shortcut(0, 3).unwrap();
    let block = builder.build();

    let err = block.forward(&Tensor::ones(&[2, 2])).unwrap_err();
    assert_eq!(err, TensorError::ComputationError("exploded".to_string()));
}

#[test]
fn test_projection_errors_pass_through_unchanged() {
    let mut builder = Residual::builder();
    builder.add(ReLU);
    builder.add_projected_shortcut(0, 2, Exploding).unwrap();
    let block = builder.build();

    let err = block.forward(&Tensor::ones(&[2])).unwrap_err();
    assert_eq!(err, TensorError::ComputationError("exploded".to_string()));
}

#[test]
fn test_mismatched_shortcut_shape_fails_whichever_side_is_larger() {
    let mut rng = StdRng::seed_from_u64(5);

    // Chain [2, 3], shortcut [2, 4].
    let mut builder = Residual::builder();
    builder.add(Linear::new(4, 3, &mut rng));
    builder.add_shortcut(0, 2).unwrap();
    let err = builder.build().forward(&Tensor::ones(&[2, 4])).unwrap_err();
    assert_eq!(err, TensorError::ShapeMismatch { lhs: vec![2, 3], rhs: vec![2, 4] });

    // Chain [2, 3], projected shortcut [3].
    let mut builder = Residual::builder();
    builder.add(ReLU);
    builder.add_projected_shortcut(0, 2, Constant(Tensor::ones(&[3]))).unwrap();
    let err = builder.build().forward(&Tensor::ones(&[2, 3])).unwrap_err();
    assert_eq!(err, TensorError::ShapeMismatch { lhs: vec![2, 3], rhs: vec![3] });

    // Chain [3], projected shortcut [2, 3].
    let mut builder = Residual::builder();
    builder.add(ReLU);
    builder.add_projected_shortcut(0, 2, Constant(Tensor::ones(&[2, 3]))).unwrap();
    let err = builder.build().forward(&Tensor::ones(&[3])).unwrap_err();
    assert_eq!(err, TensorError::ShapeMismatch { lhs: vec![3], rhs: vec![2, 3] });
}

#[test]
fn test_nested_residual_blocks() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(6);
    let inner_linear = Rc::new(Linear::new(4, 4, &mut rng));

    let mut inner = Residual::builder();
    inner.add(inner_linear.clone());
    inner.add_shortcut(0, 2).unwrap();
    let inner = Rc::new(inner.build());

    let mut outer = Residual::builder();
    outer.add(inner.clone());
    outer.add(ReLU);
    outer.add_shortcut(0, 3).unwrap();
    let outer = outer.build();

    let x = Tensor::random_uniform(&[2, 4], -1.0, 1.0, &mut rng);
    let inner_out = inner_linear.forward(&x).unwrap().add(&x).unwrap();
    let expected = inner_out.relu().add(&x).unwrap();
    assert_close(&outer.forward(&x).unwrap(), &expected);
    assert_eq!(outer.parameters().len(), 2);
}
