//! Derivative-free minimization with the Nelder–Mead simplex method.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    /// Stop once the objective values of the simplex differ by less than this.
    pub f_tolerance: f64,
    /// ... and the simplex vertices lie within this distance of the best vertex.
    pub x_tolerance: f64,
    /// Edge length of the initial simplex along each coordinate axis.
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            f_tolerance: 1e-8,
            x_tolerance: 1e-6,
            initial_step: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum<const N: usize> {
    pub x: [f64; N],
    pub value: f64,
    pub iterations: usize,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

fn affine<const N: usize>(from: &[f64; N], to: &[f64; N], factor: f64) -> [f64; N] {
    std::array::from_fn(|i| from[i] + factor * (to[i] - from[i]))
}

/// Minimizes `f` starting from `start`.
///
/// Non-finite objective values are treated as worse than any finite value.
pub fn nelder_mead<const N: usize, F>(
    mut f: F,
    start: [f64; N],
    options: &NelderMeadOptions,
) -> Minimum<N>
where
    F: FnMut(&[f64; N]) -> f64,
{
    let mut eval = |x: &[f64; N]| {
        let v = f(x);
        if v.is_nan() { f64::INFINITY } else { v }
    };

    let mut simplex: Vec<([f64; N], f64)> = Vec::with_capacity(N + 1);
    simplex.push((start, eval(&start)));
    for i in 0..N {
        let mut vertex = start;
        vertex[i] += options.initial_step;
        simplex.push((vertex, eval(&vertex)));
    }

    let mut iterations = 0;
    while iterations < options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (best, best_value) = simplex[0];
        let worst_value = simplex[N].1;

        let spread = (worst_value - best_value).abs();
        let size = simplex[1..]
            .iter()
            .flat_map(|(x, _)| x.iter().zip(best.iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        if spread <= options.f_tolerance && size <= options.x_tolerance {
            break;
        }
        iterations += 1;

        let centroid: [f64; N] = std::array::from_fn(|i| {
            simplex[..N].iter().map(|(x, _)| x[i]).sum::<f64>() / N as f64
        });
        let worst = simplex[N].0;

        let reflected = affine(&centroid, &worst, -REFLECT);
        let reflected_value = eval(&reflected);

        if reflected_value < best_value {
            let expanded = affine(&centroid, &worst, -EXPAND);
            let expanded_value = eval(&expanded);
            simplex[N] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }
        if reflected_value < simplex[N - 1].1 {
            simplex[N] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < worst_value {
            let outside = affine(&centroid, &reflected, CONTRACT);
            let value = eval(&outside);
            (outside, value)
        } else {
            let inside = affine(&centroid, &worst, CONTRACT);
            let value = eval(&inside);
            (inside, value)
        };
        if contracted_value < reflected_value.min(worst_value) {
            simplex[N] = (contracted, contracted_value);
            continue;
        }

        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = affine(&best, &vertex.0, SHRINK);
            *vertex = (shrunk, eval(&shrunk));
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex[0];
    Minimum {
        x,
        value,
        iterations,
    }
}
