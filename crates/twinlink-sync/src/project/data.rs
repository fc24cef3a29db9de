//! Data element projectors: Property, Range, MultiLanguageProperty, Blob, File.

use twinlink_core::{MultiLanguageProperty, Property, Range};
use twinlink_graph::AccessLevel;

use super::{add_bound_value, add_reference, add_text, ProjectCtx, Staged, Target};
use crate::binding::ValueKind;
use crate::error::Result;

pub(super) fn property(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    property: &Property,
) -> Result<()> {
    let root = staged.root();
    let access = if target.submodel.is_none() && ctx.read_only_without_submodel {
        AccessLevel::ReadOnly
    } else {
        AccessLevel::ReadWrite
    };

    add_bound_value(ctx, staged, &root, "Value", ValueKind::PropertyValue, target, access)?;
    add_text(ctx, staged, &root, "ValueType", property.value_type.as_str())?;
    if let Some(value_id) = &property.value_id {
        add_reference(ctx, staged, &root, "ValueId", Some(value_id), AccessLevel::ReadOnly)?;
    }
    Ok(())
}

pub(super) fn range(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    range: &Range,
) -> Result<()> {
    let root = staged.root();
    add_text(ctx, staged, &root, "ValueType", range.value_type.as_str())?;
    add_bound_value(
        ctx,
        staged,
        &root,
        "Min",
        ValueKind::RangeMin,
        target,
        AccessLevel::ReadWrite,
    )?;
    add_bound_value(
        ctx,
        staged,
        &root,
        "Max",
        ValueKind::RangeMax,
        target,
        AccessLevel::ReadWrite,
    )?;
    Ok(())
}

/// The value array is sized at creation; a longer value needs a rebuild.
pub(super) fn multi_language(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    mlp: &MultiLanguageProperty,
) -> Result<()> {
    let root = staged.root();
    let node = add_bound_value(
        ctx,
        staged,
        &root,
        "Value",
        ValueKind::MultiLanguageValue,
        target,
        AccessLevel::ReadWrite,
    )?;
    if let Some(value) = staged.graph.node_mut(&node) {
        value.array_len = Some(mlp.value.len());
    }
    if let Some(value_id) = &mlp.value_id {
        add_reference(ctx, staged, &root, "ValueId", Some(value_id), AccessLevel::ReadOnly)?;
    }
    Ok(())
}

pub(super) fn blob(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
) -> Result<()> {
    let root = staged.root();
    add_bound_value(
        ctx,
        staged,
        &root,
        "MimeType",
        ValueKind::ContentType,
        target,
        AccessLevel::ReadWrite,
    )?;
    add_bound_value(
        ctx,
        staged,
        &root,
        "Value",
        ValueKind::BlobValue,
        target,
        AccessLevel::ReadWrite,
    )?;
    Ok(())
}

pub(super) fn file(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
) -> Result<()> {
    let root = staged.root();
    add_bound_value(
        ctx,
        staged,
        &root,
        "MimeType",
        ValueKind::ContentType,
        target,
        AccessLevel::ReadWrite,
    )?;
    add_bound_value(
        ctx,
        staged,
        &root,
        "Value",
        ValueKind::FileValue,
        target,
        AccessLevel::ReadWrite,
    )?;
    Ok(())
}
