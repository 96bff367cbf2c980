use std::collections::HashSet;

use proptest::prelude::*;

use initdag::InitRunner;
use initdag_test_utils::builders::{TestContext, TestTaskBuilder};
use initdag_test_utils::{init_tracing, with_timeout};

// Strategy to generate a valid DAG as a dependency list per task.
// Acyclicity is guaranteed by only allowing task N to depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    // Sanitize: only allow deps < i, deduplicated.
                    let valid: HashSet<usize> = potential
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|d| d % i.max(1))
                        .collect();
                    valid.into_iter().collect()
                })
                .collect()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_task_starts_after_all_its_dependencies_finished(deps in dag_strategy(8)) {
        init_tracing();

        let num_tasks = deps.len();
        let deps_for_run = deps.clone();

        let entries = with_timeout(move || {
            let ctx = TestContext::new();
            let runner = InitRunner::builder(ctx.clone()).build();

            let tasks = deps_for_run
                .iter()
                .enumerate()
                .map(|(i, task_deps)| {
                    let name = format!("task_{i}");
                    let mut builder = TestTaskBuilder::new(&name).body(move |ctx| {
                        ctx.record(format!("s:task_{i}"));
                        ctx.record(format!("e:task_{i}"));
                        Ok(())
                    });
                    for d in task_deps {
                        builder = builder.after(&format!("task_{d}"));
                    }
                    builder.build()
                })
                .collect();

            runner.run(tasks).unwrap();
            ctx.entries()
        });

        let position = |entry: &str| entries.iter().position(|e| e == entry);

        for i in 0..num_tasks {
            let start = position(&format!("s:task_{i}"));
            prop_assert!(start.is_some(), "task_{} never ran", i);
            // Exactly one start per task.
            prop_assert_eq!(
                entries.iter().filter(|e| **e == format!("s:task_{i}")).count(),
                1
            );

            for &d in &deps[i] {
                let dep_end = position(&format!("e:task_{d}"));
                prop_assert!(dep_end.is_some(), "task_{} never finished", d);
                prop_assert!(
                    dep_end.unwrap() < start.unwrap(),
                    "task_{} started before its dependency task_{} finished: {:?}",
                    i,
                    d,
                    entries
                );
            }
        }
    }
}
