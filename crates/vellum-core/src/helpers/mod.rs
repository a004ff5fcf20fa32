/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Built-in helpers.

pub mod collection;
pub mod control;
pub mod fields;

use crate::helper::HelperRegistry;

pub use collection::CollectionHelper;
pub use control::{EachHelper, EqHelper, IfHelper, UnlessHelper, WithHelper};
pub use fields::{HtmlHelper, LinkHelper, NumberHelper, TextHelper};

pub(crate) fn register_builtins(registry: &mut HelperRegistry) {
    registry
        .register_default::<IfHelper>("if")
        .register_default::<UnlessHelper>("unless")
        .register_default::<EachHelper>("each")
        .register_default::<WithHelper>("with")
        .register_default::<EqHelper>("eq")
        .register_default::<CollectionHelper>("collection")
        .register_default::<TextHelper>("text")
        .register_default::<HtmlHelper>("html")
        .register_default::<NumberHelper>("number")
        .register_default::<LinkHelper>("link");
}
