/*!
The provider table (spec section 5, "Shared resources"): each variant may
publish one typed record per type it chooses to publish; its dependents
read it back during their own action generation. Readers only ever see
values from modules whose action generation ran earlier in the pipeline,
by construction: `publish` for a module only happens once, during that
module's own turn in the single top-down action-generation pass.
*/

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::ModuleIndex;

#[derive(Default)]
pub struct ProviderTable {
    values: HashMap<(ModuleIndex, TypeId), Box<dyn Any>>,
}

impl ProviderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `value` as the provider of type `T` for `module`. A module
    /// publishing the same type twice overwrites the earlier value; this
    /// never happens in practice since action generation runs exactly
    /// once per variant.
    pub fn publish<T: 'static>(&mut self, module: ModuleIndex, value: T) {
        self.values.insert((module, TypeId::of::<T>()), Box::new(value));
    }

    pub fn publish_any(&mut self, module: ModuleIndex, value: Box<dyn Any>) {
        self.values.insert((module, (*value).type_id()), value);
    }

    /// Read the provider of type `T` published by `module`, if any.
    pub fn get<T: 'static>(&self, module: ModuleIndex) -> Option<&T> {
        self.values.get(&(module, TypeId::of::<T>())).and_then(|v| v.downcast_ref::<T>())
    }
}
