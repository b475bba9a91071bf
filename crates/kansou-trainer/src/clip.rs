use candle_core::backprop::GradStore;
use candle_core::{DType, Result, Var};

/// Rescale gradients in place so their global L2 norm is at most `max_norm`.
///
/// Returns the norm measured before clipping. Vars without a gradient are
/// skipped.
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> Result<f64> {
    let mut sum_sq = 0f64;
    for var in vars {
        if let Some(grad) = grads.get(var) {
            sum_sq += grad
                .sqr()?
                .sum_all()?
                .to_dtype(DType::F64)?
                .to_scalar::<f64>()?;
        }
    }
    let total_norm = sum_sq.sqrt();

    if total_norm > max_norm {
        let scale = max_norm / (total_norm + 1e-6);
        for var in vars {
            if let Some(grad) = grads.remove(var) {
                grads.insert(var, (grad * scale)?);
            }
        }
    }
    Ok(total_norm)
}
