//! Entity projector.

use twinlink_core::Entity;
use twinlink_graph::AccessLevel;

use super::{
    add_bound_reference, add_bound_value, add_reference, add_text, project_children, ProjectCtx,
    Staged, Target,
};
use crate::binding::ValueKind;
use crate::error::Result;

pub(super) fn entity(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    entity: &Entity,
) -> Result<()> {
    let root = staged.root();
    add_bound_value(
        ctx,
        staged,
        &root,
        "EntityType",
        ValueKind::EntityType,
        target,
        AccessLevel::ReadWrite,
    )?;

    // Bound even when unset so a later value change has a node to land on.
    add_bound_reference(
        ctx,
        staged,
        &root,
        "GlobalAssetId",
        ValueKind::EntityGlobalAssetId,
        target,
        entity.global_asset_id.as_ref(),
    )?;

    if let Some(specific) = &entity.specific_asset_id {
        let node = staged.component(&root, ctx.object("SpecificAssetId"))?;
        add_text(ctx, staged, &node, "Name", &specific.name)?;
        add_text(ctx, staged, &node, "Value", &specific.value)?;
        if let Some(subject) = &specific.external_subject_id {
            add_reference(
                ctx,
                staged,
                &node,
                "ExternalSubjectId",
                Some(subject),
                AccessLevel::ReadOnly,
            )?;
        }
    }

    let statements = staged.component(&root, ctx.object("Statement"))?;
    project_children(
        ctx,
        staged,
        &statements,
        &entity.statements,
        target.reference,
        target.submodel,
        false,
        false,
    )
}
