//! Conversions between plain feature rows and burn tensors.

use burn::prelude::*;
use burn::tensor::TensorData;

/// Stack feature rows into a `(batch, dim)` tensor.
///
/// Fails if the batch is empty or rows have inconsistent lengths.
pub fn features_to_tensor<B: Backend>(
    rows: &[Vec<f32>],
    device: &B::Device,
) -> anyhow::Result<Tensor<B, 2>> {
    let Some(first) = rows.first() else {
        anyhow::bail!("feature batch must not be empty");
    };
    let dim = first.len();
    anyhow::ensure!(dim > 0, "feature dimension must be > 0");
    for (i, row) in rows.iter().enumerate() {
        anyhow::ensure!(
            row.len() == dim,
            "feature row {i} has length {}, expected {dim}",
            row.len()
        );
    }

    let batch = rows.len();
    let flat: Vec<f32> = rows.iter().flat_map(|v| v.iter().copied()).collect();
    Ok(Tensor::from_data(TensorData::new(flat, [batch, dim]), device))
}

/// 1D tensor from per-example values (labels, weights).
pub fn values_to_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

/// Extract f64 values from a burn 1D tensor.
pub fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f64> {
    tensor
        .into_data()
        .iter::<f32>()
        .map(|v| v as f64)
        .collect()
}

/// Extract a single f64 scalar from a one-element tensor.
pub fn tensor_to_f64<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    let val: f32 = tensor.into_scalar().elem();
    val as f64
}
