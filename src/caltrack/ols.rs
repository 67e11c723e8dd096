//! Least squares fitting used by the daily and hourly models.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Error, Result};

const SVD_EPS: f64 = 1e-10;

/// Ordinary least squares fit with coefficient inference.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    /// Two-sided p-value per coefficient; `None` when undefined.
    pub p_values: Vec<Option<f64>>,
    pub r_squared: f64,
    pub r_squared_adj: f64,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub df_resid: f64,
}

/// Fits `y = X b` where `X` already carries an intercept column if one is wanted.
pub fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit> {
    let (n, k) = x.shape();
    if n != y.len() {
        return Err(Error::Fit(format!(
            "design matrix has {} rows but target has {}",
            n,
            y.len()
        )));
    }
    if n <= k {
        return Err(Error::Fit(format!(
            "not enough observations ({}) for {} parameters",
            n, k
        )));
    }

    let xtx = x.transpose() * x;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| Error::Fit("singular design matrix".to_string()))?;
    let beta = &xtx_inv * x.transpose() * y;

    let fitted = x * &beta;
    let residuals = y - &fitted;
    let ssr = residuals.norm_squared();
    let mean_y = y.mean();
    let sst = y.iter().map(|v| (v - mean_y).powi(2)).sum::<f64>();

    let df_resid = (n - k) as f64;
    let r_squared = if sst > f64::EPSILON { 1.0 - ssr / sst } else { 0.0 };
    let r_squared_adj = 1.0 - (n as f64 - 1.0) / df_resid * (1.0 - r_squared);

    let sigma2 = ssr / df_resid;
    let t_dist = StudentsT::new(0.0, 1.0, df_resid).ok();
    let p_values = (0..k)
        .map(|j| {
            let se = (sigma2 * xtx_inv[(j, j)]).sqrt();
            let t_dist = t_dist.as_ref()?;
            if !se.is_finite() {
                return None;
            }
            if se == 0.0 {
                return Some(if beta[j] == 0.0 { 1.0 } else { 0.0 });
            }
            let t = (beta[j] / se).abs();
            Some(2.0 * (1.0 - t_dist.cdf(t)))
        })
        .collect();

    Ok(OlsFit {
        params: beta.iter().copied().collect(),
        p_values,
        r_squared,
        r_squared_adj,
        fitted: fitted.iter().copied().collect(),
        residuals: residuals.iter().copied().collect(),
        df_resid,
    })
}

/// Weighted least squares, minimum-norm solution for rank-deficient designs.
pub fn wls(x: &DMatrix<f64>, y: &DVector<f64>, weights: &[f64]) -> Result<DVector<f64>> {
    let (n, _) = x.shape();
    if n != y.len() || n != weights.len() {
        return Err(Error::Fit("weighted fit inputs differ in length".to_string()));
    }
    if n == 0 {
        return Err(Error::Fit("no observations to fit".to_string()));
    }

    let mut xw = x.clone();
    let mut yw = y.clone();
    for (i, w) in weights.iter().enumerate() {
        let s = w.max(0.0).sqrt();
        xw.row_mut(i).scale_mut(s);
        yw[i] *= s;
    }

    xw.svd(true, true)
        .solve(&yw, SVD_EPS)
        .map_err(|e| Error::Fit(e.to_string()))
}
