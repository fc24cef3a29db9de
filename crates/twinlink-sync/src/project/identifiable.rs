//! Projectors for shells, submodels, concept descriptions and qualifiers.

use twinlink_core::{AssetAdministrationShell, ConceptDescription, Qualifier, Submodel};
use twinlink_graph::AccessLevel;

use super::{add_base_data, add_reference, add_text, project_children, ProjectCtx, Staged};
use crate::error::{Result, SyncError};

fn display_name<'a>(id_short: &'a str, id: &'a str) -> &'a str {
    if id_short.is_empty() {
        id
    } else {
        id_short
    }
}

fn require_id(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(SyncError::Validation(format!("{kind} without id")));
    }
    Ok(())
}

/// `Submodel:<idShort>` with its elements in declared order.
pub(crate) fn project_submodel(ctx: &ProjectCtx<'_>, submodel: &Submodel) -> Result<Staged> {
    require_id("Submodel", &submodel.id)?;
    let reference = submodel.reference();
    let name = format!(
        "Submodel:{}",
        display_name(&submodel.base.id_short, &submodel.id)
    );

    let mut staged = Staged::new(ctx.object(&name));
    let root = staged.root();
    add_text(ctx, &mut staged, &root, "Identification", &submodel.id)?;
    add_base_data(ctx, &mut staged, &root, &submodel.base)?;
    project_children(
        ctx,
        &mut staged,
        &root,
        &submodel.submodel_elements,
        &reference,
        Some(&reference),
        false,
        false,
    )?;

    staged.registration.references.push((reference, root));
    Ok(staged)
}

/// `AAS:<idShort>` with asset information and its submodel references.
pub(crate) fn project_shell(
    ctx: &ProjectCtx<'_>,
    shell: &AssetAdministrationShell,
) -> Result<Staged> {
    require_id("AssetAdministrationShell", &shell.id)?;
    let name = format!("AAS:{}", display_name(&shell.base.id_short, &shell.id));

    let mut staged = Staged::new(ctx.object(&name));
    let root = staged.root();
    add_text(ctx, &mut staged, &root, "Identification", &shell.id)?;
    add_base_data(ctx, &mut staged, &root, &shell.base)?;

    let info = &shell.asset_information;
    let info_node = staged.component(&root, ctx.object("AssetInformation"))?;
    add_text(ctx, &mut staged, &info_node, "AssetKind", info.asset_kind.as_str())?;
    if let Some(global) = &info.global_asset_id {
        add_reference(
            ctx,
            &mut staged,
            &info_node,
            "GlobalAssetId",
            Some(global),
            AccessLevel::ReadOnly,
        )?;
    }
    for specific in &info.specific_asset_ids {
        let node = staged.component(&info_node, ctx.object(&specific.name))?;
        add_text(ctx, &mut staged, &node, "Value", &specific.value)?;
    }

    let refs = staged.component(&root, ctx.object("Submodel"))?;
    for (i, submodel) in shell.submodels.iter().enumerate() {
        let name = format!("Submodel{i}");
        add_reference(ctx, &mut staged, &refs, &name, Some(submodel), AccessLevel::ReadOnly)?;
    }

    staged.registration.references.push((shell.reference(), root));
    Ok(staged)
}

/// Dictionary entry for a concept description.
pub(crate) fn project_concept_description(
    ctx: &ProjectCtx<'_>,
    concept: &ConceptDescription,
) -> Result<Staged> {
    require_id("ConceptDescription", &concept.id)?;
    let name = display_name(&concept.base.id_short, &concept.id);

    let mut staged = Staged::new(ctx.object(name));
    let root = staged.root();
    add_text(ctx, &mut staged, &root, "Identification", &concept.id)?;
    add_base_data(ctx, &mut staged, &root, &concept.base)?;
    if !concept.is_case_of.is_empty() {
        let folder = staged.component(&root, ctx.object("IsCaseOf"))?;
        for (i, case) in concept.is_case_of.iter().enumerate() {
            let name = format!("IsCaseOf{i}");
            add_reference(ctx, &mut staged, &folder, &name, Some(case), AccessLevel::ReadOnly)?;
        }
    }

    staged.registration.references.push((concept.reference(), root));
    Ok(staged)
}

/// One qualifier, named by its type.
pub(crate) fn project_qualifier(ctx: &ProjectCtx<'_>, qualifier: &Qualifier) -> Result<Staged> {
    if qualifier.qualifier_type.trim().is_empty() {
        return Err(SyncError::Validation("Qualifier without type".to_string()));
    }

    let mut staged = Staged::new(ctx.object(&qualifier.qualifier_type));
    let root = staged.root();
    add_text(ctx, &mut staged, &root, "Type", &qualifier.qualifier_type)?;
    add_text(ctx, &mut staged, &root, "ValueType", qualifier.value_type.as_str())?;

    let value = ctx
        .bridge
        .to_variant(qualifier.value_type, qualifier.value.as_deref())?;
    let data_type = ctx.bridge.data_type_for(qualifier.value_type);
    staged.property(&root, ctx.variable("Value", value, data_type))?;

    if let Some(value_id) = &qualifier.value_id {
        add_reference(ctx, &mut staged, &root, "ValueId", Some(value_id), AccessLevel::ReadOnly)?;
    }
    Ok(staged)
}
