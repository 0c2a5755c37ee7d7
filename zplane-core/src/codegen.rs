//! Portable C reference implementation of a realized filter.
//!
//! The emitted translation unit is a ring-buffer Direct-Form-II filter with
//! two entry points, `reset_filter` and `process_sample`. [`ReferenceFilter`]
//! runs the same arithmetic, in the same order, so the generated behaviour
//! can be checked from Rust.
//!
//! Notes
//! - Coefficients are written with shortest round-trip formatting, so the
//!   compiled constants are bit-identical to the in-memory values.
//! - Both arrays are padded to `FILTER_ORDER + 1` entries; the loops never
//!   read past the end when numerator and denominator degrees differ.
//! - `a[0]` is assumed to be 1 (the deriver produces monic denominators).

use core::fmt::Write as _;

use crate::error::{Result, ZplaneError};
use crate::poly;
use crate::transfer::FilterCoefficients;

/// Generated C source plus the order it was sized for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedSource {
    order: usize,
    text: String,
}

impl GeneratedSource {
    #[inline] pub fn order(&self) -> usize { self.order }
    #[inline] pub fn as_str(&self) -> &str { &self.text }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl core::fmt::Display for GeneratedSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.text)
    }
}

fn c_array(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Emit the C translation unit for `coeffs`.
pub fn generate_reference_source(coeffs: &FilterCoefficients) -> Result<GeneratedSource> {
    if coeffs
        .numerator
        .iter()
        .chain(coeffs.denominator.iter())
        .any(|c| !c.is_finite())
    {
        return Err(ZplaneError::invalid("cannot emit non-finite coefficients"));
    }
    let order = coeffs.order();
    let b = poly::pad_to(&coeffs.numerator, order + 1);
    let a = poly::pad_to(&coeffs.denominator, order + 1);
    let zeros = coeffs.numerator.len().saturating_sub(1);
    let poles = coeffs.denominator.len().saturating_sub(1);

    let mut s = String::with_capacity(2048);
    // Writing into a String cannot fail.
    let _ = write!(
        s,
        r#"/**
 * Auto-generated digital filter implementation
 * Realization: Direct Form II (ring buffer)
 * Number of zeros: {zeros}
 * Number of poles: {poles}
 */

#include <stdio.h>
#include <string.h>

#define FILTER_ORDER {order}
#define BUFFER_SIZE (FILTER_ORDER + 1)

/* Filter coefficients, padded to FILTER_ORDER + 1 */
static const double b_coeffs[BUFFER_SIZE] = {{{b}}};
static const double a_coeffs[BUFFER_SIZE] = {{{a}}};

/* Direct Form II state */
static double state[BUFFER_SIZE] = {{0.0}};
static int buffer_index = 0;

void reset_filter(void) {{
    memset(state, 0, sizeof(state));
    buffer_index = 0;
}}

double process_sample(double input) {{
    double output = 0.0;
    double new_state = input;

    for (int i = 1; i <= FILTER_ORDER; i++) {{
        new_state -= a_coeffs[i] * state[(buffer_index - i + BUFFER_SIZE) % BUFFER_SIZE];
    }}

    state[buffer_index] = new_state;

    for (int i = 0; i <= FILTER_ORDER; i++) {{
        output += b_coeffs[i] * state[(buffer_index - i + BUFFER_SIZE) % BUFFER_SIZE];
    }}

    buffer_index = (buffer_index + 1) % BUFFER_SIZE;
    return output;
}}

#ifdef FILTER_TEST
int main(void) {{
    double impulse[] = {{1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0}};
    int n = sizeof(impulse) / sizeof(impulse[0]);

    reset_filter();
    printf("Impulse response\n");
    for (int i = 0; i < n; i++) {{
        printf("%d %.17g\n", i, process_sample(impulse[i]));
    }}
    return 0;
}}
#endif
"#,
        b = c_array(&b),
        a = c_array(&a),
    );

    Ok(GeneratedSource { order, text: s })
}

/// Rust mirror of the generated `process_sample`/`reset_filter` pair.
#[derive(Clone, Debug)]
pub struct ReferenceFilter {
    b: Vec<f64>,
    a: Vec<f64>,
    state: Vec<f64>,
    index: usize,
}

impl ReferenceFilter {
    pub fn new(coeffs: &FilterCoefficients) -> Self {
        let n = coeffs.order() + 1;
        Self {
            b: poly::pad_to(&coeffs.numerator, n),
            a: poly::pad_to(&coeffs.denominator, n),
            state: vec![0.0; n],
            index: 0,
        }
    }

    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|s| *s = 0.0);
        self.index = 0;
    }

    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let size = self.state.len();
        let order = size - 1;
        let mut new_state = input;
        for i in 1..=order {
            new_state -= self.a[i] * self.state[(self.index + size - i) % size];
        }
        self.state[self.index] = new_state;
        let mut output = 0.0;
        for i in 0..=order {
            output += self.b[i] * self.state[(self.index + size - i) % size];
        }
        self.index = (self.index + 1) % size;
        output
    }
}
