//! Finding the schema positions that describe a location in the document.
//!
//! Every step derefs `$ref`s and, where the document already has a node,
//! descends into the single best `oneOf`/`anyOf` branch for it. A location
//! without a node yet keeps its branches unexpanded; value completion
//! flattens them itself.

use crate::document::{NodeId, ParsedTree, PathSegment};
use crate::schema::{EffectiveSchema, Items, Schema, SchemaNode};
use crate::validation::{resolve_branches, ValidationOptions, Validator};

pub(crate) fn schemas_at<'s>(
    schema: &'s EffectiveSchema,
    tree: Option<&ParsedTree>,
    path: &[PathSegment],
    options: &ValidationOptions,
) -> Vec<&'s SchemaNode> {
    let validator = tree.map(|tree| Validator::new(tree, schema, options));
    let walker = Walker {
        schema,
        validator: validator.as_ref(),
        max_depth: options.max_depth,
    };

    let mut node = tree.map(|tree| tree.root());
    let mut current = Vec::new();
    walker.expand(schema.root(), node, 0, &mut current);

    for (depth, segment) in path.iter().enumerate() {
        node = tree.and_then(|tree| tree.find_by_path(&path[..=depth]));
        let children: Vec<&'s Schema> = current
            .iter()
            .filter_map(|parent| child_schema(parent, segment))
            .collect();
        current = Vec::new();
        for child in children {
            walker.expand(child, node, depth + 1, &mut current);
        }
        if current.is_empty() {
            break;
        }
    }
    current
}

/// The schema a parent assigns to one of its children.
pub(crate) fn child_schema<'s>(parent: &'s SchemaNode, segment: &PathSegment) -> Option<&'s Schema> {
    match segment {
        PathSegment::Key(key) => parent
            .properties
            .get(key)
            .or(parent.additional_properties.as_ref()),
        PathSegment::Index(index) => match parent.items.as_ref()? {
            Items::Single(item) => Some(item),
            Items::Tuple(positional) => positional
                .get(*index)
                .or(parent.additional_items.as_ref()),
        },
    }
}

struct Walker<'s, 'v> {
    schema: &'s EffectiveSchema,
    validator: Option<&'v Validator<'v>>,
    max_depth: usize,
}

impl<'s> Walker<'s, '_> {
    fn expand(&self, schema: &'s Schema, node: Option<NodeId>, depth: usize, out: &mut Vec<&'s SchemaNode>) {
        if depth > self.max_depth {
            return;
        }
        let Some(target) = self
            .schema
            .deref(schema, self.max_depth)
            .and_then(Schema::as_node)
        else {
            return;
        };
        out.push(target);

        let (Some(validator), Some(node)) = (self.validator, node) else {
            return;
        };
        for branches in [&target.one_of, &target.any_of].into_iter().flatten() {
            if branches.is_empty() {
                continue;
            }
            let best = resolve_branches(validator, node, branches, depth + 1).best();
            self.expand(&branches[best], Some(node), depth + 1, out);
        }
    }
}
