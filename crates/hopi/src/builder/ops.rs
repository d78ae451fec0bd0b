//! Operator sugar on handles
//!
//! `&a + &b` builds the handle `(a + b)`. The right-hand side may be any
//! [`Arg`], so `&a * 2` works too. The output is a `Result` because the
//! operands may come from different sessions.

use crate::builder::Handle;
use crate::codec::Arg;
use crate::error::Result;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

macro_rules! binary_op {
    ($($trait:ident :: $method:ident => $symbol:literal),* $(,)?) => {
        $(
            impl<T: Into<Arg>> $trait<T> for &Handle {
                type Output = Result<Handle>;

                fn $method(self, rhs: T) -> Self::Output {
                    self.infix(concat!(" ", $symbol, " "), rhs.into())
                }
            }

            impl<T: Into<Arg>> $trait<T> for Handle {
                type Output = Result<Handle>;

                fn $method(self, rhs: T) -> Self::Output {
                    $trait::$method(&self, rhs)
                }
            }
        )*
    };
}

binary_op! {
    Add::add => "+",
    Sub::sub => "-",
    Mul::mul => "*",
    Div::div => "/",
    Rem::rem => "%",
}

impl Neg for &Handle {
    type Output = Result<Handle>;

    fn neg(self) -> Self::Output {
        self.enclosed("(-", ")")
    }
}

impl Neg for Handle {
    type Output = Result<Handle>;

    fn neg(self) -> Self::Output {
        -&self
    }
}
