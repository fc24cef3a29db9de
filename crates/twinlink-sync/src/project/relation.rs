//! Reference-valued element projectors.

use twinlink_core::{AnnotatedRelationshipElement, ReferenceElement, SubmodelElement};

use super::{add_bound_reference, project_children, ProjectCtx, Staged, Target};
use crate::binding::ValueKind;
use crate::error::Result;

pub(super) fn reference_element(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    element: &ReferenceElement,
) -> Result<()> {
    let root = staged.root();
    add_bound_reference(
        ctx,
        staged,
        &root,
        "Value",
        ValueKind::ReferenceValue,
        target,
        element.value.as_ref(),
    )?;
    Ok(())
}

/// `First` and `Second` for plain and annotated relationships.
pub(super) fn relationship(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
) -> Result<()> {
    let (first, second) = match target.element {
        SubmodelElement::RelationshipElement(r) => (&r.first, &r.second),
        SubmodelElement::AnnotatedRelationshipElement(r) => (&r.first, &r.second),
        _ => return Ok(()),
    };
    let root = staged.root();
    add_bound_reference(
        ctx,
        staged,
        &root,
        "First",
        ValueKind::RelationshipFirst,
        target,
        Some(first),
    )?;
    add_bound_reference(
        ctx,
        staged,
        &root,
        "Second",
        ValueKind::RelationshipSecond,
        target,
        Some(second),
    )?;
    Ok(())
}

pub(super) fn annotations(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    element: &AnnotatedRelationshipElement,
) -> Result<()> {
    let root = staged.root();
    let folder = staged.component(&root, ctx.object("Annotation"))?;
    project_children(
        ctx,
        staged,
        &folder,
        &element.annotations,
        target.reference,
        target.submodel,
        false,
        false,
    )
}
