//! Controller bindings: at most one controller per network.
//!
//! The index is a pair of maps kept in lockstep. `by_controller` answers
//! routing queries ("which network does this controller drive?") and
//! `by_network` answers the uniqueness check during placement and merges.

use std::collections::HashMap;

use lattice_grid::GridPosition;
use serde::{Deserialize, Serialize};

use crate::{ControllerId, NetworkId};

/// Where a controller currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerBinding {
    pub network: NetworkId,
    pub position: GridPosition,
}

/// A controller that was thrown out of a network to keep it unique.
///
/// The host decides what ejection means in its world (typically the segment
/// is dropped as an item). Each ejection is reported exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ejection {
    pub controller: ControllerId,
    pub position: GridPosition,
    /// The network the controller was bound to before the collision, if any
    pub network: Option<NetworkId>,
}

/// Bidirectional controller ↔ network index.
#[derive(Debug, Default, Clone)]
pub struct ControllerIndex {
    by_controller: HashMap<ControllerId, ControllerBinding>,
    by_network: HashMap<NetworkId, ControllerId>,
}

impl ControllerIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Network and position of a controller.
    pub fn binding(&self, controller: ControllerId) -> Option<ControllerBinding> {
        self.by_controller.get(&controller).copied()
    }

    /// Network a controller is bound to.
    pub fn network_of(&self, controller: ControllerId) -> Option<NetworkId> {
        self.by_controller.get(&controller).map(|b| b.network)
    }

    /// Controller bound to a network.
    pub fn controller_of(&self, network: NetworkId) -> Option<ControllerId> {
        self.by_network.get(&network).copied()
    }

    /// Whether `network` already has a controller.
    pub fn is_occupied(&self, network: NetworkId) -> bool {
        self.by_network.contains_key(&network)
    }

    /// Bind a controller to a network.
    ///
    /// Rebinding an already bound controller moves it (this is how merges
    /// and splits carry a controller to its new network id). Fails with the
    /// occupying controller if `network` already holds a different one.
    pub fn bind(
        &mut self,
        controller: ControllerId,
        network: NetworkId,
        position: GridPosition,
    ) -> Result<(), ControllerId> {
        if let Some(&existing) = self.by_network.get(&network) {
            if existing != controller {
                return Err(existing);
            }
        }
        let binding = ControllerBinding { network, position };
        if let Some(previous) = self.by_controller.insert(controller, binding) {
            if previous.network != network {
                self.by_network.remove(&previous.network);
            }
        }
        self.by_network.insert(network, controller);
        Ok(())
    }

    /// Remove a controller's binding.
    pub fn release(&mut self, controller: ControllerId) -> Option<ControllerBinding> {
        let binding = self.by_controller.remove(&controller)?;
        if self.by_network.get(&binding.network) == Some(&controller) {
            self.by_network.remove(&binding.network);
        }
        Some(binding)
    }

    /// Drop the network side of a binding whose network id is being retired.
    ///
    /// The controller keeps its entry until it is rebound or released.
    pub(crate) fn retire_network(&mut self, network: NetworkId) {
        self.by_network.remove(&network);
    }

    /// All bindings, unordered.
    pub fn iter(&self) -> impl Iterator<Item = (ControllerId, ControllerBinding)> + '_ {
        self.by_controller.iter().map(|(c, b)| (*c, *b))
    }

    pub fn len(&self) -> usize {
        self.by_controller.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_controller.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_controller.clear();
        self.by_network.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32) -> GridPosition {
        GridPosition::at(x, 0, 0)
    }

    #[test]
    fn bind_and_lookup() {
        let mut index = ControllerIndex::new();
        index.bind(ControllerId(1), NetworkId(10), pos(0)).unwrap();

        assert_eq!(index.network_of(ControllerId(1)), Some(NetworkId(10)));
        assert_eq!(index.controller_of(NetworkId(10)), Some(ControllerId(1)));
        assert!(index.is_occupied(NetworkId(10)));
    }

    #[test]
    fn second_controller_is_refused() {
        let mut index = ControllerIndex::new();
        index.bind(ControllerId(1), NetworkId(10), pos(0)).unwrap();

        let refused = index.bind(ControllerId(2), NetworkId(10), pos(1));
        assert_eq!(refused, Err(ControllerId(1)));
        assert_eq!(index.network_of(ControllerId(2)), None);
    }

    #[test]
    fn rebinding_moves_the_controller() {
        let mut index = ControllerIndex::new();
        index.bind(ControllerId(1), NetworkId(10), pos(0)).unwrap();
        index.bind(ControllerId(1), NetworkId(11), pos(0)).unwrap();

        assert_eq!(index.network_of(ControllerId(1)), Some(NetworkId(11)));
        assert!(!index.is_occupied(NetworkId(10)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn release_clears_both_sides() {
        let mut index = ControllerIndex::new();
        index.bind(ControllerId(1), NetworkId(10), pos(0)).unwrap();

        let binding = index.release(ControllerId(1)).unwrap();
        assert_eq!(binding.position, pos(0));
        assert!(!index.is_occupied(NetworkId(10)));
        assert!(index.is_empty());
        assert!(index.release(ControllerId(1)).is_none());
    }
}
