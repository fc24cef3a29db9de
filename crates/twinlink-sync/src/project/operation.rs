//! Operation projector: a method node whose arguments mirror the
//! operation's declared variables.

use twinlink_core::{Operation, OperationVariable, SubmodelElement};
use twinlink_graph::{Argument, DataType, GraphNode, MethodSignature};

use super::{ProjectCtx, Staged, Target};
use crate::binding::ValueKind;
use crate::error::Result;

pub(super) fn operation(
    ctx: &ProjectCtx<'_>,
    staged: &mut Staged,
    target: &Target<'_>,
    operation: &Operation,
) -> Result<()> {
    let root = staged.root();
    let name = staged
        .graph
        .node(&root)
        .map(|n| n.browse_name.clone())
        .unwrap_or_default();

    let signature = MethodSignature {
        inputs: input_variables(operation)
            .map(|v| argument(ctx, v))
            .collect(),
        outputs: output_variables(operation)
            .map(|v| argument(ctx, v))
            .collect(),
    };
    let method = GraphNode::method(ctx.store.allocate_id(), &name, signature);
    let node = staged.component(&root, method)?;
    staged.bind(node, target.binding(ValueKind::Operation));
    Ok(())
}

/// Declared inputs, in order: input variables then in-out variables.
pub(crate) fn input_variables(operation: &Operation) -> impl Iterator<Item = &OperationVariable> {
    operation
        .input_variables
        .iter()
        .chain(&operation.inoutput_variables)
}

/// Declared outputs, in order: output variables then in-out variables.
pub(crate) fn output_variables(operation: &Operation) -> impl Iterator<Item = &OperationVariable> {
    operation
        .output_variables
        .iter()
        .chain(&operation.inoutput_variables)
}

fn argument(ctx: &ProjectCtx<'_>, variable: &OperationVariable) -> Argument {
    match &variable.value {
        SubmodelElement::Property(p) => Argument {
            name: p.base.id_short.clone(),
            data_type: ctx.bridge.data_type_for(p.value_type),
            description: p.base.descriptions.first().map(|d| d.text.clone()),
        },
        other => {
            tracing::warn!(
                variable = %other.id_short(),
                kind = %other.key_type(),
                "Only Property variables are supported as arguments, using String"
            );
            Argument {
                name: other.id_short().to_string(),
                data_type: DataType::String,
                description: None,
            }
        }
    }
}
