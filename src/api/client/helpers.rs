//! Fan-out helpers
//!
//! `all` runs independent requests concurrently and `spread` hands the
//! collected results to a callback as positional arguments.

use futures::future::{try_join_all, TryFuture};

use super::{ApiClient, ClientError};

impl ApiClient {
    /// Run `requests` concurrently.
    ///
    /// Results come back in input order; the first failure wins.
    pub async fn all<I>(requests: I) -> Result<Vec<<I::Item as TryFuture>::Ok>, ClientError>
    where
        I: IntoIterator,
        I::Item: TryFuture<Error = ClientError>,
    {
        try_join_all(requests).await
    }

    /// Adapt a callback of N arguments into a function over N results
    pub fn spread<T, R, A, F>(callback: F) -> impl FnOnce(Vec<T>) -> Result<R, ClientError>
    where
        F: SpreadFn<T, R, A>,
    {
        move |values| callback.call_spread(values)
    }
}

/// Callbacks that can receive a `Vec` of results as positional arguments.
///
/// `A` only disambiguates arity; it is inferred from the callback.
pub trait SpreadFn<T, R, A> {
    fn call_spread(self, values: Vec<T>) -> Result<R, ClientError>;
}

macro_rules! replace_ty {
    ($_arg:ident, $ty:ty) => {
        $ty
    };
}

macro_rules! impl_spread_fn {
    ($len:literal => $($arg:ident),+) => {
        impl<F, T, R> SpreadFn<T, R, [(); $len]> for F
        where
            F: FnOnce($(replace_ty!($arg, T)),+) -> R,
        {
            fn call_spread(self, values: Vec<T>) -> Result<R, ClientError> {
                let [$($arg),+] = <[T; $len]>::try_from(values)
                    .map_err(|values| arity_error($len, values.len()))?;
                Ok(self($($arg),+))
            }
        }
    };
}

impl_spread_fn!(1 => a);
impl_spread_fn!(2 => a, b);
impl_spread_fn!(3 => a, b, c);
impl_spread_fn!(4 => a, b, c, d);
impl_spread_fn!(5 => a, b, c, d, e);
impl_spread_fn!(6 => a, b, c, d, e, f);

fn arity_error(expected: usize, actual: usize) -> ClientError {
    ClientError::Usage(format!(
        "spread callback takes {} results, got {}",
        expected, actual
    ))
}
