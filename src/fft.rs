// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Two-dimensional FFTs with the origin at the centre pixel (n/2) of each axis
//! rather than at index 0.

use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use rustfft::{Fft, FftPlanner};

/// Forward (unnormalised) FFT of a plane, in place. On both sides of the
/// transform the origin is pixel (ny/2, nx/2).
pub(crate) fn fft2_centred(mut plane: ArrayViewMut2<c64>) {
    let (ny, nx) = plane.dim();
    if nx == 0 || ny == 0 {
        return;
    }

    let mut planner = FftPlanner::new();
    let row_fft = planner.plan_fft_forward(nx);
    let col_fft = planner.plan_fft_forward(ny);
    let mut buffer = Vec::with_capacity(nx.max(ny));
    let mut scratch = vec![
        c64::default();
        row_fft
            .get_inplace_scratch_len()
            .max(col_fft.get_inplace_scratch_len())
    ];

    for row in plane.rows_mut() {
        transform_lane(row, row_fft.as_ref(), &mut buffer, &mut scratch);
    }
    for col in plane.columns_mut() {
        transform_lane(col, col_fft.as_ref(), &mut buffer, &mut scratch);
    }
}

fn transform_lane(
    mut lane: ArrayViewMut1<c64>,
    fft: &dyn Fft<f64>,
    buffer: &mut Vec<c64>,
    scratch: &mut [c64],
) {
    let n = lane.len();
    buffer.clear();
    buffer.extend(lane.iter());
    buffer.rotate_left(n / 2);
    fft.process_with_scratch(buffer, &mut scratch[..fft.get_inplace_scratch_len()]);
    buffer.rotate_right(n / 2);
    lane.iter_mut().zip(buffer.iter()).for_each(|(l, b)| *l = *b);
}

/// The smallest even number at least `n` with no prime factors above 5.
pub(crate) fn next_composite(n: usize) -> usize {
    let mut m = n.max(2);
    if m % 2 == 1 {
        m += 1;
    }
    loop {
        let mut r = m;
        for p in [2, 3, 5] {
            while r % p == 0 {
                r /= p;
            }
        }
        if r == 1 {
            return m;
        }
        m += 2;
    }
}
