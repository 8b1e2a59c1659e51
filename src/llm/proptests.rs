//! Property-based tests for streamed tool-call reconstruction
//!
//! - Accumulated arguments equal the ordered concatenation of fragments,
//!   wherever the id and name fragments land
//! - Sealed calls come out in ascending index order
//! - The decoder yields the same events however the byte stream is chunked

use super::accumulator::ToolCallAccumulator;
use super::streaming::{decode_sse, StreamEvent, ToolCallDelta};
use futures::StreamExt;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Argument fragments for one call, with the positions where the id and name
/// fragments arrive
fn arb_fragmented_call() -> impl Strategy<Value = (Vec<String>, usize, usize)> {
    proptest::collection::vec("[a-zA-Z0-9\":{},]{0,8}", 1..8).prop_flat_map(|fragments| {
        let n = fragments.len();
        (Just(fragments), 0..n, 0..n)
    })
}

// ============================================================================
// Accumulator properties
// ============================================================================

proptest! {
    #[test]
    fn prop_arguments_are_concatenated(
        (fragments, id_at, name_at) in arb_fragmented_call()
    ) {
        let mut acc = ToolCallAccumulator::new();
        for (i, fragment) in fragments.iter().enumerate() {
            let mut delta = ToolCallDelta::new(0).arguments(fragment.clone());
            if i == id_at {
                delta = delta.id("t1");
            }
            if i == name_at {
                delta = delta.name("eliminateCharacter");
            }
            acc.apply(&delta);
        }

        let calls = acc.seal();
        prop_assert_eq!(calls.len(), 1);
        prop_assert_eq!(calls[0].id.as_str(), "t1");
        prop_assert_eq!(calls[0].name(), "eliminateCharacter");
        prop_assert_eq!(calls[0].arguments(), fragments.concat());
    }

    #[test]
    fn prop_seal_orders_by_index(
        indices in proptest::collection::vec(0u32..16, 1..20)
    ) {
        let mut acc = ToolCallAccumulator::new();
        for index in &indices {
            acc.apply(&ToolCallDelta::new(*index).arguments(index.to_string()));
        }

        let mut expected: Vec<u32> = indices.clone();
        expected.sort_unstable();
        expected.dedup();

        let ids: Vec<String> = acc.seal().into_iter().map(|c| c.id).collect();
        let expected_ids: Vec<String> = expected.iter().map(|i| format!("call_{i}")).collect();
        prop_assert_eq!(ids, expected_ids);
    }

    #[test]
    fn prop_chunking_does_not_change_events(
        texts in proptest::collection::vec("[a-zA-Z ?]{1,12}", 1..6),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..6)
    ) {
        let mut body = String::new();
        for text in &texts {
            body.push_str(&format!(
                "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n\n"
            ));
        }
        body.push_str("data: [DONE]\n\n");
        let bytes = body.into_bytes();

        let mut offsets: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len())).collect();
        offsets.push(0);
        offsets.push(bytes.len());
        offsets.sort_unstable();
        offsets.dedup();
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = offsets
            .windows(2)
            .map(|w| Ok(bytes[w[0]..w[1]].to_vec()))
            .collect();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let events: Vec<StreamEvent> =
            runtime.block_on(decode_sse(futures::stream::iter(chunks)).collect());

        let decoded: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ContentDelta(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(decoded, texts);
        prop_assert!(matches!(events.last(), Some(StreamEvent::Done(None))));
    }
}
