//! Macros for common proxy call patterns
//!
//! Building a proxy call by hand means writing the representation string and
//! the boxed closure yourself. The [`invoke!`](crate::invoke) macro generates
//! both from a method-call shape.

/// Invoke an actor method through a proxy
///
/// Expands `invoke!(proxy, method(arg1, arg2))` into a [`Proxy::call`]
/// whose representation is `"method(arg1,arg2)"` and whose closure awaits
/// `actor.method(&ctx, arg1, arg2)`. The target method's signature must be
///
/// ```ignore
/// async fn method(&mut self, ctx: &ActorContext<Self>, ...) -> ActorResult<R>
/// ```
///
/// The macro returns the [`CallFuture`] for the invocation; awaiting it
/// yields the typed [`Delivery`].
///
/// [`Proxy::call`]: crate::proxy::Proxy::call
/// [`CallFuture`]: crate::message::CallFuture
/// [`Delivery`]: crate::message::Delivery
#[macro_export]
macro_rules! invoke {
    ($proxy:expr, $method:ident ( $($arg:expr),* $(,)? )) => {{
        let args: ::std::vec::Vec<::std::string::String> =
            ::std::vec![$(::std::format!("{:?}", &$arg)),*];
        $proxy.call(
            $crate::message::representation(::std::stringify!($method), &args),
            move |mut actor, ctx| {
                ::std::boxed::Box::pin(async move {
                    actor.$method(&ctx, $($arg),*).await
                })
            },
        )
    }};
}

#[cfg(test)]
mod tests {
    use crate::message::representation;

    #[test]
    fn test_representation_shape_matches_macro_output() {
        let args = vec![format!("{:?}", 7), format!("{:?}", "x")];
        assert_eq!(representation("set", &args), "set(7,\"x\")");
    }
}
