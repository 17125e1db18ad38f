//! Tool-call argument accumulation.
//!
//! Providers stream tool-call arguments as string fragments tagged with a
//! call index. Each index owns one accumulator that concatenates fragments
//! in arrival order; the accumulator freezes into an immutable
//! [`AssembledToolCall`] when the stream completes.

use std::collections::BTreeMap;

use crate::types::AssembledToolCall;

/// Partial tool call being assembled from fragments.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    /// Append an argument fragment. Fragments must be applied in arrival
    /// order; out-of-order application is undefined.
    pub fn push_fragment(&mut self, fragment: &str) {
        self.arguments.push_str(fragment);
    }

    /// Argument text accumulated so far.
    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    /// Freeze into the final immutable call.
    pub fn freeze(self) -> AssembledToolCall {
        AssembledToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

/// Accumulators keyed by call index within one response.
///
/// Owned by a single adapter instance; never shared across streams.
#[derive(Debug, Default)]
pub struct ToolCallAccumulators {
    by_index: BTreeMap<u32, ToolCallAccumulator>,
}

impl ToolCallAccumulators {
    /// Accumulator for the given call index, created on first use.
    pub fn entry(&mut self, index: u32) -> &mut ToolCallAccumulator {
        self.by_index.entry(index).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Freeze all accumulators into assembled calls, ordered by index.
    pub fn freeze(self) -> Vec<AssembledToolCall> {
        self.by_index.into_values().map(ToolCallAccumulator::freeze).collect()
    }
}
