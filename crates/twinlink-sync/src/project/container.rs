//! Collection and list projectors.

use twinlink_core::{SubmodelElementCollection, SubmodelElementList};
use twinlink_graph::{DataType, Variant};

use super::{add_text, project_children, ProjectCtx, Staged, Target};
use crate::error::Result;

pub(super) fn collection(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    collection: &SubmodelElementCollection,
) -> Result<()> {
    let root = staged.root();
    staged.property(
        &root,
        ctx.variable(
            "AllowDuplicates",
            Variant::Boolean(collection.allow_duplicates),
            DataType::Boolean,
        ),
    )?;
    project_children(
        ctx,
        staged,
        &root,
        &collection.value,
        target.reference,
        target.submodel,
        collection.ordered,
        false,
    )
}

/// List items are always ordered and addressed by position.
pub(super) fn list(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    list: &SubmodelElementList,
) -> Result<()> {
    let root = staged.root();
    staged.property(
        &root,
        ctx.variable(
            "OrderRelevant",
            Variant::Boolean(list.order_relevant),
            DataType::Boolean,
        ),
    )?;
    if let Some(kind) = list.type_value_list_element {
        add_text(ctx, staged, &root, "TypeValueListElement", kind.as_str())?;
    }
    if let Some(value_type) = list.value_type_list_element {
        add_text(ctx, staged, &root, "ValueTypeListElement", value_type.as_str())?;
    }
    project_children(
        ctx,
        staged,
        &root,
        &list.value,
        target.reference,
        target.submodel,
        true,
        true,
    )
}
