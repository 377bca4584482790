//! Small reverse-mode automatic differentiation utility.
//!
//! The fitting objective is a low-dimensional nonlinear least-squares
//! problem (about 85 scalars), so a full tensor framework is unnecessary.
//! Computations record their elementary operations on a [`Tape`]; calling
//! [`Var::gradients`] sweeps the tape backwards once and yields the partial
//! derivative of the output with respect to every recorded variable.
//!
//! Model code is written once against the [`Real`] trait and runs either on
//! plain `f64` (no tracking) or on [`Var`] (tracked).

use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Scalar abstraction shared by plain and differentiable evaluation
pub trait Real:
    Copy
    + fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + Add<f64, Output = Self>
    + Sub<f64, Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    /// Current numeric value
    fn value(&self) -> f64;

    /// A constant in the same evaluation context as `self`
    fn lift(&self, constant: f64) -> Self;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn sqrt(self) -> Self;
}

impl Real for f64 {
    fn value(&self) -> f64 {
        *self
    }

    fn lift(&self, constant: f64) -> Self {
        constant
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    parents: [usize; 2],
    partials: [f64; 2],
}

/// Wengert list recording every elementary operation of one evaluation
#[derive(Debug, Default)]
pub struct Tape {
    nodes: RefCell<Vec<Node>>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: RefCell::new(Vec::with_capacity(capacity)),
        }
    }

    /// Register an independent variable
    pub fn var(&self, value: f64) -> Var<'_> {
        let index = self.leaf();
        Var {
            tape: self,
            index,
            value,
        }
    }

    /// Register a slice of independent variables
    pub fn vars(&self, values: &[f64]) -> Vec<Var<'_>> {
        values.iter().map(|&v| self.var(v)).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn leaf(&self) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len();
        nodes.push(Node {
            parents: [index, index],
            partials: [0.0, 0.0],
        });
        index
    }

    fn unary(&self, parent: usize, partial: f64) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len();
        nodes.push(Node {
            parents: [parent, parent],
            partials: [partial, 0.0],
        });
        index
    }

    fn binary(&self, parents: [usize; 2], partials: [f64; 2]) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len();
        nodes.push(Node { parents, partials });
        index
    }
}

/// A scalar recorded on a [`Tape`]
#[derive(Clone, Copy)]
pub struct Var<'t> {
    tape: &'t Tape,
    index: usize,
    value: f64,
}

impl fmt::Debug for Var<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("index", &self.index)
            .field("value", &self.value)
            .finish()
    }
}

impl<'t> Var<'t> {
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Back-propagate from this variable through the whole tape
    pub fn gradients(&self) -> Gradients {
        let nodes = self.tape.nodes.borrow();
        let mut adjoints = vec![0.0; nodes.len()];
        adjoints[self.index] = 1.0;

        for i in (0..=self.index).rev() {
            let adjoint = adjoints[i];
            if adjoint == 0.0 {
                continue;
            }
            let node = nodes[i];
            adjoints[node.parents[0]] += node.partials[0] * adjoint;
            adjoints[node.parents[1]] += node.partials[1] * adjoint;
        }

        Gradients { adjoints }
    }

    fn tape_eq(&self, other: &Var<'_>) -> bool {
        std::ptr::eq(self.tape, other.tape)
    }
}

impl<'t> Real for Var<'t> {
    fn value(&self) -> f64 {
        self.value
    }

    fn lift(&self, constant: f64) -> Self {
        self.tape.var(constant)
    }

    fn sin(self) -> Self {
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, self.value.cos()),
            value: self.value.sin(),
        }
    }

    fn cos(self) -> Self {
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, -self.value.sin()),
            value: self.value.cos(),
        }
    }

    fn sqrt(self) -> Self {
        let value = self.value.sqrt();
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, 0.5 / value),
            value,
        }
    }
}

/// Partial derivatives of one output with respect to every tape entry
#[derive(Debug, Clone)]
pub struct Gradients {
    adjoints: Vec<f64>,
}

impl Gradients {
    pub fn wrt(&self, var: &Var<'_>) -> f64 {
        self.adjoints.get(var.index).copied().unwrap_or(0.0)
    }

    pub fn wrt_all(&self, vars: &[Var<'_>]) -> Vec<f64> {
        vars.iter().map(|v| self.wrt(v)).collect()
    }
}

impl<'t> Add for Var<'t> {
    type Output = Var<'t>;

    fn add(self, rhs: Var<'t>) -> Var<'t> {
        debug_assert!(self.tape_eq(&rhs));
        Var {
            tape: self.tape,
            index: self.tape.binary([self.index, rhs.index], [1.0, 1.0]),
            value: self.value + rhs.value,
        }
    }
}

impl<'t> Sub for Var<'t> {
    type Output = Var<'t>;

    fn sub(self, rhs: Var<'t>) -> Var<'t> {
        debug_assert!(self.tape_eq(&rhs));
        Var {
            tape: self.tape,
            index: self.tape.binary([self.index, rhs.index], [1.0, -1.0]),
            value: self.value - rhs.value,
        }
    }
}

impl<'t> Mul for Var<'t> {
    type Output = Var<'t>;

    fn mul(self, rhs: Var<'t>) -> Var<'t> {
        debug_assert!(self.tape_eq(&rhs));
        Var {
            tape: self.tape,
            index: self
                .tape
                .binary([self.index, rhs.index], [rhs.value, self.value]),
            value: self.value * rhs.value,
        }
    }
}

impl<'t> Div for Var<'t> {
    type Output = Var<'t>;

    fn div(self, rhs: Var<'t>) -> Var<'t> {
        debug_assert!(self.tape_eq(&rhs));
        let inv = 1.0 / rhs.value;
        Var {
            tape: self.tape,
            index: self.tape.binary(
                [self.index, rhs.index],
                [inv, -self.value * inv * inv],
            ),
            value: self.value * inv,
        }
    }
}

impl<'t> Neg for Var<'t> {
    type Output = Var<'t>;

    fn neg(self) -> Var<'t> {
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, -1.0),
            value: -self.value,
        }
    }
}

impl<'t> Add<f64> for Var<'t> {
    type Output = Var<'t>;

    fn add(self, rhs: f64) -> Var<'t> {
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, 1.0),
            value: self.value + rhs,
        }
    }
}

impl<'t> Sub<f64> for Var<'t> {
    type Output = Var<'t>;

    fn sub(self, rhs: f64) -> Var<'t> {
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, 1.0),
            value: self.value - rhs,
        }
    }
}

impl<'t> Mul<f64> for Var<'t> {
    type Output = Var<'t>;

    fn mul(self, rhs: f64) -> Var<'t> {
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, rhs),
            value: self.value * rhs,
        }
    }
}

impl<'t> Div<f64> for Var<'t> {
    type Output = Var<'t>;

    fn div(self, rhs: f64) -> Var<'t> {
        Var {
            tape: self.tape,
            index: self.tape.unary(self.index, 1.0 / rhs),
            value: self.value / rhs,
        }
    }
}

/// Sum of a non-empty sequence of scalars
pub fn sum<R: Real>(values: impl IntoIterator<Item = R>) -> Option<R> {
    values.into_iter().reduce(|acc, v| acc + v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_product_rule() {
        let tape = Tape::new();
        let x = tape.var(3.0);
        let y = tape.var(-2.0);
        let f = x * y + x * 2.0;

        let grads = f.gradients();
        assert_relative_eq!(f.value(), -6.0 + 6.0);
        assert_relative_eq!(grads.wrt(&x), -2.0 + 2.0);
        assert_relative_eq!(grads.wrt(&y), 3.0);
    }

    #[test]
    fn test_quotient_and_trig() {
        let tape = Tape::new();
        let x = tape.var(0.7);
        let f = x.sin() / (x.cos() + 2.0);

        let g = f.gradients().wrt(&x);
        let (s, c) = (0.7f64.sin(), 0.7f64.cos());
        let expected = (c * (c + 2.0) + s * s) / ((c + 2.0) * (c + 2.0));
        assert_relative_eq!(g, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_sqrt_gradient() {
        let tape = Tape::new();
        let x = tape.var(4.0);
        let f = (x * x + 9.0).sqrt();
        assert_relative_eq!(f.value(), 5.0);
        assert_relative_eq!(f.gradients().wrt(&x), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_reused_variable_accumulates() {
        let tape = Tape::new();
        let x = tape.var(1.5);
        let f = x * x * x - x;
        assert_relative_eq!(f.gradients().wrt(&x), 3.0 * 1.5 * 1.5 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lifted_constant_has_no_gradient_path() {
        let tape = Tape::new();
        let x = tape.var(2.0);
        let c = x.lift(5.0);
        let f = x * c;
        let grads = f.gradients();
        assert_relative_eq!(grads.wrt(&x), 5.0);
        assert_relative_eq!(grads.wrt(&c), 2.0);
    }

    #[test]
    fn test_matches_finite_differences() {
        fn objective<R: Real>(p: &[R]) -> R {
            let a = p[0] * p[1].cos() - p[2] / (p[0] + 3.0);
            a * a + (p[1] * p[1] + 1.0).sqrt()
        }

        let point = [0.4, -1.1, 2.5];
        let tape = Tape::new();
        let vars = tape.vars(&point);
        let grads = objective(&vars).gradients().wrt_all(&vars);

        let h = 1e-6;
        for i in 0..point.len() {
            let mut plus = point;
            let mut minus = point;
            plus[i] += h;
            minus[i] -= h;
            let numeric = (objective(&plus) - objective(&minus)) / (2.0 * h);
            assert_relative_eq!(grads[i], numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sum_helper() {
        assert_eq!(sum(Vec::<f64>::new()), None);
        assert_eq!(sum([1.0, 2.0, 3.5]), Some(6.5));
    }
}
