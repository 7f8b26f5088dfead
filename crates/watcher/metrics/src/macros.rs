/// Runs `$call`, counting it under `$calls_total` with `call` and `outcome` labels and recording
/// its duration under `$duration`.
///
/// Extra `key => value` label pairs are appended to both metrics.
#[macro_export]
macro_rules! observe_call {
    (
        $calls_total:expr,
        $duration:expr,
        $call_name:expr,
        $call:expr $(, $label_key:expr => $label_val:expr )*
    ) => {{
        let started = std::time::Instant::now();
        let result = $call;
        $crate::__record_call!(
            $calls_total, $duration, $call_name, started, &result $(, $label_key => $label_val )*
        );
        result
    }};
}

/// Async variant of [`observe_call!`], awaiting `$future`.
#[macro_export]
macro_rules! observe_call_async {
    (
        $calls_total:expr,
        $duration:expr,
        $call_name:expr,
        $future:expr $(, $label_key:expr => $label_val:expr )*
    ) => {{
        let started = std::time::Instant::now();
        let result = $future.await;
        $crate::__record_call!(
            $calls_total, $duration, $call_name, started, &result $(, $label_key => $label_val )*
        );
        result
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_call {
    (
        $calls_total:expr,
        $duration:expr,
        $call_name:expr,
        $started:expr,
        $result:expr $(, $label_key:expr => $label_val:expr )*
    ) => {{
        metrics::counter!(
            $calls_total,
            "call" => $call_name,
            "outcome" => $crate::outcome($result)
            $(, $label_key => $label_val )*
        )
        .increment(1);

        metrics::histogram!(
            $duration,
            "call" => $call_name
            $(, $label_key => $label_val )*
        )
        .record($started.elapsed().as_secs_f64());
    }};
}
