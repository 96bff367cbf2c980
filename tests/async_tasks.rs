use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use initdag::InitRunner;
use initdag_test_utils::builders::{TestContext, TestTaskBuilder};
use initdag_test_utils::recording::RecordingListener;
use initdag_test_utils::{init_tracing, with_timeout};

fn position(entries: &[String], entry: &str) -> usize {
    entries
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("entry '{entry}' missing from log {entries:?}"))
}

#[test]
fn async_task_completes_when_signaled_from_a_background_thread() {
    init_tracing();
    let entries = with_timeout(|| {
        let ctx = TestContext::new();
        let runner = InitRunner::builder(ctx.clone()).build();

        runner
            .run(vec![
                TestTaskBuilder::new("bg")
                    .async_body(|ctx, done| {
                        ctx.record("body:bg");
                        let ctx = ctx.clone();
                        thread::spawn(move || {
                            thread::sleep(Duration::from_millis(20));
                            ctx.record("signal:bg");
                            done.finish();
                        });
                        Ok(())
                    })
                    .build(),
                TestTaskBuilder::new("next")
                    .after("bg")
                    .body(|ctx| {
                        ctx.record("start:next");
                        Ok(())
                    })
                    .build(),
            ])
            .unwrap();

        ctx.entries()
    });

    // The dependent waits for the signal, not for the body return.
    assert!(position(&entries, "body:bg") < position(&entries, "start:next"));
    assert!(position(&entries, "signal:bg") < position(&entries, "start:next"));
}

#[test]
fn async_task_may_finish_inside_its_own_body() {
    init_tracing();
    let entries = with_timeout(|| {
        let ctx = TestContext::new();
        let runner = InitRunner::builder(ctx.clone()).build();

        runner
            .run(vec![
                TestTaskBuilder::new("inline")
                    .async_body(|ctx, done| {
                        ctx.record("end:inline");
                        done.finish();
                        Ok(())
                    })
                    .build(),
                TestTaskBuilder::new("next").after("inline").build(),
            ])
            .unwrap();

        ctx.entries()
    });

    assert!(position(&entries, "end:inline") < position(&entries, "next"));
}

#[test]
fn deferred_async_task_hands_off_and_signals_after_run_returns() {
    init_tracing();

    let gate = Arc::new(AtomicBool::new(false));
    let recorder = Arc::new(RecordingListener::new());

    let (ctx, recorder) = {
        let gate = Arc::clone(&gate);
        let recorder_out = Arc::clone(&recorder);
        with_timeout(move || {
            let ctx = TestContext::new();
            let listener: Arc<dyn initdag::InitListener> = Arc::clone(&recorder_out) as Arc<dyn initdag::InitListener>;
            let runner = InitRunner::builder(ctx.clone()).add_listener(listener).build();

            runner
                .run(vec![
                    TestTaskBuilder::new("eager").build(),
                    TestTaskBuilder::new("handoff")
                        .deferred(true)
                        .async_body(move |ctx, done| {
                            // Hand the work to a helper thread and return, so
                            // the pool worker is released as soon as the
                            // helper signals.
                            let ctx = ctx.clone();
                            let gate = Arc::clone(&gate);
                            thread::spawn(move || {
                                while !gate.load(Ordering::SeqCst) {
                                    thread::sleep(Duration::from_millis(2));
                                }
                                ctx.record("done:handoff");
                                done.finish();
                            });
                            Ok(())
                        })
                        .build(),
                ])
                .unwrap();

            (ctx, recorder_out)
        })
    };

    // Blocking side finished while the handoff thread is still parked.
    assert!(ctx.entries().contains(&"eager".to_string()));
    assert!(!ctx.entries().contains(&"done:handoff".to_string()));

    gate.store(true, Ordering::SeqCst);
    assert!(recorder.wait_for_after_all(Duration::from_secs(5)));
    assert!(ctx.entries().contains(&"done:handoff".to_string()));
}
