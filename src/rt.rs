// Copyright 2015-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License.

/*! Integration of the polarized radiative transfer equation.

The equation along a ray is

```text
dI/ds = j - K I
```

where `I` is the Stokes vector (I, Q, U, V), `j` the emission coefficients,
and `K` the 4×4 transfer matrix assembled from the absorption coefficients
(alpha_I, alpha_Q, alpha_U, alpha_V) and the Faraday mixing coefficients
(rho_Q, rho_U, rho_V):

```text
    ( alpha_I  alpha_Q  alpha_U  alpha_V )
K = ( alpha_Q  alpha_I   rho_V   -rho_U  )
    ( alpha_U  -rho_V   alpha_I   rho_Q  )
    ( alpha_V   rho_U   -rho_Q   alpha_I )
```

The "formal" integrator here treats the coefficients as constant across each
sampled interval, which makes every step an exact matrix-exponential update.
That is only accurate if the sampling is fine enough that `dx * lambda1` is
modest, where `lambda1` is the largest eigenvalue scale of `K`; producing such
samplings is the adaptive ray tracer's whole job.

*/

use nalgebra::{Matrix4, Matrix5, Vector4};
use ndarray::{Array1, Array2};

use crate::RTIntegrator;

/// Assemble the 4×4 transfer matrix from one row of absorption and Faraday
/// coefficients.
fn transfer_matrix(alpha: &[f64], rho: &[f64]) -> Matrix4<f64> {
    let (ai, aq, au, av) = (alpha[0], alpha[1], alpha[2], alpha[3]);
    let (rq, ru, rv) = (rho[0], rho[1], rho[2]);

    Matrix4::new(
        ai, aq, au, av, //
        aq, ai, rv, -ru, //
        au, -rv, ai, rq, //
        av, ru, -rq, ai,
    )
}

/// A radiative-transfer integrator using the constant-coefficient formal
/// solution on each sampled interval.
///
/// Per interval of length `dx`, with `K` and `j` taken as the mean of the
/// endpoint samples, the update is
///
/// ```text
/// I_next = exp(-K dx) I + dx phi1(-K dx) j
/// ```
///
/// where `phi1(A) = A^-1 (exp(A) - 1)`, extended continuously through
/// singular `A`. Rather than special-casing small or singular `K dx`, both
/// terms are read off of the exponential of the augmented 5×5 matrix
///
/// ```text
/// ( -K dx   j dx )          ( exp(-K dx)   dx phi1(-K dx) j )
/// (   0      0   )  |-->    (     0                1        )
/// ```
///
/// which handles the vacuum limit `K -> 0` exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormalRTIntegrator;

impl FormalRTIntegrator {
    /// Create a new integrator.
    pub fn new() -> Self {
        FormalRTIntegrator
    }
}

impl RTIntegrator for FormalRTIntegrator {
    fn integrate(
        &self,
        s: &Array1<f64>,
        j: &Array2<f64>,
        alpha: &Array2<f64>,
        rho: &Array2<f64>,
    ) -> Array2<f64> {
        let n = s.len();
        let mut iquv = Array2::zeros((n, 4));
        let mut cur = Vector4::zeros();

        for k in 1..n {
            let dx = s[k] - s[k - 1];

            let mean = |arr: &Array2<f64>, col: usize| 0.5 * (arr[(k - 1, col)] + arr[(k, col)]);
            let a = [
                mean(alpha, 0),
                mean(alpha, 1),
                mean(alpha, 2),
                mean(alpha, 3),
            ];
            let r = [mean(rho, 0), mean(rho, 1), mean(rho, 2)];
            let jm = [mean(j, 0), mean(j, 1), mean(j, 2), mean(j, 3)];

            let kmat = transfer_matrix(&a, &r);

            let mut aug = Matrix5::zeros();
            for row in 0..4 {
                for col in 0..4 {
                    aug[(row, col)] = -kmat[(row, col)] * dx;
                }
                aug[(row, 4)] = jm[row] * dx;
            }

            let prop = aug.exp();

            let mut next = Vector4::zeros();
            for row in 0..4 {
                let mut acc = prop[(row, 4)];
                for col in 0..4 {
                    acc += prop[(row, col)] * cur[col];
                }
                next[row] = acc;
            }

            cur = next;

            for col in 0..4 {
                iquv[(k, col)] = cur[col];
            }
        }

        iquv
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::Array2;

    use super::*;

    fn uniform_medium(n: usize, len: f64, j_i: f64, alpha_i: f64) -> Array2<f64> {
        let s = Array1::linspace(0., len, n);
        let mut j = Array2::zeros((n, 4));
        let mut alpha = Array2::zeros((n, 4));
        let rho = Array2::zeros((n, 3));

        for k in 0..n {
            j[(k, 0)] = j_i;
            alpha[(k, 0)] = alpha_i;
        }

        FormalRTIntegrator::new().integrate(&s, &j, &alpha, &rho)
    }

    #[test]
    fn test_vacuum_stays_dark() {
        let iquv = uniform_medium(16, 1e10, 0., 0.);

        for k in 0..16 {
            for col in 0..4 {
                assert_eq!(iquv[(k, col)], 0.);
            }
        }
    }

    #[test]
    fn test_optically_thin_unpolarized_slab() {
        // With negligible absorption, I grows linearly: I = j * L.
        let iquv = uniform_medium(64, 1e10, 1e-22, 0.);
        assert_approx_eq!(iquv[(63, 0)], 1e-12, 1e-17);
        assert_eq!(iquv[(63, 1)], 0.);
    }

    #[test]
    fn test_uniform_slab_analytic() {
        // The classic solution: I = (j / alpha) (1 - exp(-alpha L)).
        let j_i = 1e-22;
        let alpha_i = 3e-11;
        let len = 1e11;
        let iquv = uniform_medium(128, len, j_i, alpha_i);

        let expected = j_i / alpha_i * (1. - (-alpha_i * len).exp());
        assert_approx_eq!(iquv[(127, 0)], expected, expected * 1e-8);
    }

    #[test]
    fn test_two_samples_suffice() {
        // n = 2 is the degenerate-but-legal case produced by empty rays.
        let iquv = uniform_medium(2, 1e10, 1e-22, 0.);
        assert_eq!(iquv.dim(), (2, 4));
        assert_approx_eq!(iquv[(1, 0)], 1e-12, 1e-15);
    }

    #[test]
    fn test_faraday_rotation_mixes_q_and_u() {
        // A pure rho_V medium rotates Q into U without changing the total
        // linear polarization or Stokes I.
        let n = 200;
        let len = 1e10;
        let s = Array1::linspace(0., len, n);
        let mut j = Array2::zeros((n, 4));
        let alpha = Array2::zeros((n, 4));
        let mut rho = Array2::zeros((n, 3));

        for k in 0..n {
            j[(k, 0)] = 1e-22;
            j[(k, 1)] = 0.5e-22;
            rho[(k, 2)] = 3e-10;
        }

        let iquv = FormalRTIntegrator::new().integrate(&s, &j, &alpha, &rho);
        let last = n - 1;

        assert!(iquv[(last, 2)].abs() > 0.);
        let lin = (iquv[(last, 1)].powi(2) + iquv[(last, 2)].powi(2)).sqrt();
        assert!(lin <= 0.5 * iquv[(last, 0)] * (1. + 1e-9));
        assert_approx_eq!(iquv[(last, 0)], 1e-12, 1e-15);
    }

    #[test]
    fn test_intensity_profile_is_monotonic_in_emission() {
        let iquv = uniform_medium(32, 1e10, 1e-22, 1e-11);

        for k in 1..32 {
            assert!(iquv[(k, 0)] > iquv[(k - 1, 0)]);
        }
    }
}
