//! Call-site macros that name saved values after the variables passed in.

/// Saves variables under their own names.
///
/// `save!(path, alpha, beta)` writes a file holding `alpha` and `beta`. Every
/// value argument must be a plain variable; anything else is refused with a
/// name resolution error that cites its position. The values are cloned, not
/// moved.
///
/// ```no_run
/// # fn main() -> ppersist::PersistResult<()> {
/// let alpha = vec![1, 2, 3];
/// let beta_2 = 2.5;
/// ppersist::save!("out.ppst", alpha, beta_2)?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! save {
    ($destination:expr, $($value:expr),+ $(,)?) => {
        $crate::save_call(
            $destination,
            concat!(
                "save(",
                stringify!($destination),
                $(", ", stringify!($value),)+
                ")"
            ),
            vec![$($crate::ToValue::to_value(&$value)),+],
        )
    };
}

/// Adds variables to a [`Saver`](crate::Saver) under their own names.
#[macro_export]
macro_rules! save_into {
    ($saver:expr, $first:expr $(, $rest:expr)* $(,)?) => {
        $saver.add_call(
            concat!("add(", stringify!($first), $(", ", stringify!($rest),)* ")"),
            vec![
                $crate::ToValue::to_value(&$first)
                $(, $crate::ToValue::to_value(&$rest))*
            ],
        )
    };
}

/// Loads a file and binds the listed stored variables as locals.
///
/// Meant for exploratory code. Expands to statements that use `?`, so the
/// enclosing function must return a `Result` whose error converts from
/// [`PersistError`](crate::PersistError). A listed name absent from the file
/// is a `MissingField` error.
///
/// ```no_run
/// # fn main() -> ppersist::PersistResult<()> {
/// ppersist::mload!("out.ppst"; alpha, beta_2);
/// ppersist::mload!("other.ppst", ppersist::Trust::Trusted; gamma);
/// println!("{alpha:?} {beta_2:?} {gamma:?}");
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! mload {
    ($path:expr; $($name:ident),+ $(,)?) => {
        $crate::mload!($path, $crate::Trust::Gated; $($name),+);
    };
    ($path:expr, $trust:expr; $($name:ident),+ $(,)?) => {
        let mut record = $crate::load($path, $trust)?;
        $(let $name = record.take(stringify!($name))?;)+
        $crate::__announce_bound(&[$(stringify!($name)),+]);
    };
}
