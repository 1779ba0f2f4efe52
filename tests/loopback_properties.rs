//! Property-based tests for process supervision
//!
//! **Feature: pipewarden-process, Property 1: Loopback Byte Preservation**
//! **Feature: pipewarden-process, Property 2: Event Sequence Termination**
//! **Feature: pipewarden-process, Property 3: Single Completion Event**

#![cfg(unix)]

use futures::StreamExt;
use pipewarden_process::{Event, ProcessConfig, StreamSource, Supervisor, SupervisorState};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn cat() -> ProcessConfig {
    ProcessConfig::new("/bin/sh").args(["-c", "cat"])
}

/// Strategy for generating child input, including empty and binary payloads
fn input_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(Vec::new()),
        prop::collection::vec(any::<u8>(), 1..512),
        prop::collection::vec(any::<u8>(), 4096..200_000),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property 1: Loopback Byte Preservation
    ///
    /// For any input, bytes written to a copying child arrive on stdout in
    /// order and undiminished, whatever the read buffer size.
    #[test]
    fn prop_loopback_preserves_bytes(
        input in input_strategy(),
        buffer_size in 1usize..16_384,
    ) {
        let stdout = runtime().block_on(async {
            let config = cat().read_buffer_size(buffer_size);
            let mut supervisor = Supervisor::start(config).unwrap();
            let writer = supervisor.spawn_input_writer(input.clone()).unwrap();

            let output = supervisor.output().await;
            writer.await.unwrap().unwrap();
            assert!(output.outcome.is_success());
            output.stdout
        });

        prop_assert_eq!(stdout.len(), input.len());
        prop_assert_eq!(stdout, input);
    }

    /// Property 2 and 3: the event sequence ends, after exactly one completion
    ///
    /// For any exit code, consuming `events()` terminates with both streams
    /// drained and a single completion event carrying that code.
    #[test]
    fn prop_events_terminate_with_one_completion(code in 0i32..=255, lines in 0usize..50) {
        let (completions, stdout_bytes, state, code_seen) = runtime().block_on(async {
            let script = format!(
                "i=0; while [ $i -lt {} ]; do echo line$i; echo err$i >&2; i=$((i+1)); done; exit {}",
                lines, code
            );
            let mut supervisor = Supervisor::start(
                ProcessConfig::new("/bin/sh").args(["-c", script.as_str()]),
            )
            .unwrap();
            supervisor.close_input().await.unwrap();

            let events: Vec<Event> = supervisor.events().collect().await;
            let mut completions = 0;
            let mut stdout_bytes = 0;
            let mut code_seen = None;
            for event in &events {
                match event {
                    Event::Exited(outcome) => {
                        completions += 1;
                        code_seen = outcome.code();
                    }
                    Event::Output { source: StreamSource::Stdout, data } => stdout_bytes += data.len(),
                    _ => {}
                }
            }
            (completions, stdout_bytes, supervisor.state(), code_seen)
        });

        let expected: usize = (0..lines).map(|i| format!("line{}\n", i).len()).sum();
        prop_assert_eq!(completions, 1);
        prop_assert_eq!(stdout_bytes, expected);
        prop_assert_eq!(state, SupervisorState::Terminated);
        prop_assert_eq!(code_seen, Some(code));
    }
}
