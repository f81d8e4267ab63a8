use serde_json::Value;

use crate::error::Error;
use crate::join::dedup::EquivalenceMode;
use crate::join::rename::{NameGenerator, RenameContext};
use crate::join::strategy::{
    CollisionContext, CollisionKind, CollisionResolution, ResolutionAction, Strategy,
};
use crate::join::JoinerOptions;
use crate::report::{
    severity_of, CollisionEvent, CollisionReport, Resolution, SourceRef, Warnings,
    WarningCategory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Effective outcome of one collision; the section merger applies it
/// to the destination map.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    KeptLeft,
    KeptRight,
    Renamed { side: Side, new_name: String },
    Deduplicated,
    Custom(Value),
}

pub(crate) struct EngineIo<'a> {
    pub warnings: &'a mut Warnings,
    pub report: &'a mut Option<CollisionReport>,
    pub namer: &'a NameGenerator,
}

/// Resolves a collision to exactly one outcome, consulting the user
/// handler first and the configured strategy second.
pub(crate) fn resolve(
    options: &JoinerOptions,
    io: &mut EngineIo<'_>,
    ctx: &CollisionContext<'_>,
) -> Result<Outcome, Error> {
    let outcome = match handler_resolution(options, io, ctx) {
        Ok(Some(outcome)) => Ok(outcome),
        Ok(None) => strategy_resolution(options, io, ctx),
        Err(err) => Err(err),
    };

    if outcome.is_err() {
        record_event(io.report, ctx, Resolution::Failed, None);
    }

    outcome
}

pub(crate) fn record_event(
    report: &mut Option<CollisionReport>,
    ctx: &CollisionContext<'_>,
    resolution: Resolution,
    new_name: Option<String>,
) {
    if let Some(report) = report {
        report.record(CollisionEvent {
            name: ctx.name.to_string(),
            left: SourceRef {
                path: ctx.left_source.to_string(),
                line: ctx.left_location.0,
                column: ctx.left_location.1,
            },
            right: SourceRef {
                path: ctx.right_source.to_string(),
                line: ctx.right_location.0,
                column: ctx.right_location.1,
            },
            strategy: ctx.strategy,
            resolution,
            new_name,
            severity: severity_of(resolution),
        });
    }
}

fn handler_resolution(
    options: &JoinerOptions,
    io: &mut EngineIo<'_>,
    ctx: &CollisionContext<'_>,
) -> Result<Option<Outcome>, Error> {
    let handler = match &options.handler {
        Some(handler) => handler,
        None => return Ok(None),
    };

    if let Some(kinds) = &options.handler_kinds {
        if !kinds.contains(&ctx.kind) {
            return Ok(None);
        }
    }

    let resolution = match handler(ctx) {
        Ok(resolution) => resolution,
        Err(err) => {
            io.warnings.add_at(
                WarningCategory::HandlerError,
                format!(
                    "collision handler failed: {err}, falling back to {} strategy",
                    ctx.strategy
                ),
                &ctx.json_path,
                ctx.right_location,
            );

            return Ok(None);
        }
    };

    if let Some(message) = resolution
        .message
        .as_ref()
        .filter(|m| !m.is_empty())
    {
        io.warnings.add_at(
            WarningCategory::HandlerResolution,
            message.clone(),
            &ctx.json_path,
            ctx.right_location,
        );
    }

    apply_handler_action(options, io, ctx, resolution)
}

fn apply_handler_action(
    options: &JoinerOptions,
    io: &mut EngineIo<'_>,
    ctx: &CollisionContext<'_>,
    resolution: CollisionResolution,
) -> Result<Option<Outcome>, Error> {
    match resolution.action {
        ResolutionAction::Continue => Ok(None),
        ResolutionAction::AcceptLeft => {
            warn_accept(io.warnings, ctx, Resolution::KeptLeft);
            Ok(Some(Outcome::KeptLeft))
        }
        ResolutionAction::AcceptRight => {
            warn_accept(io.warnings, ctx, Resolution::KeptRight);
            Ok(Some(Outcome::KeptRight))
        }
        ResolutionAction::Rename => {
            if ctx.kind.is_pathlike() {
                return Err(Error::ResolutionNotSupportedForPaths(
                    "ResolutionRename".to_string(),
                ));
            }

            let new_name = resolution
                .new_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| generate_name(options, io.namer, ctx, Side::Right));

            Ok(Some(Outcome::Renamed {
                side: Side::Right,
                new_name,
            }))
        }
        ResolutionAction::Deduplicate => deduplicate(options, io, ctx).map(Some),
        ResolutionAction::Custom => {
            if ctx.kind.is_pathlike() {
                return Err(Error::ResolutionNotSupportedForPaths(
                    "ResolutionCustom".to_string(),
                ));
            }

            match resolution.custom_value {
                Some(value) if value.is_object() => Ok(Some(Outcome::Custom(value))),
                _ => Err(Error::CustomValueWrongType(ctx.kind.to_string())),
            }
        }
        ResolutionAction::Fail => Err(Error::HandlerFail(
            resolution
                .message
                .unwrap_or_else(|| format!("collision on {}", ctx.name)),
        )),
    }
}

fn strategy_resolution(
    options: &JoinerOptions,
    io: &mut EngineIo<'_>,
    ctx: &CollisionContext<'_>,
) -> Result<Outcome, Error> {
    match ctx.strategy {
        Strategy::Fail => Err(collision_error(ctx)),
        Strategy::FailOnPaths => {
            if ctx.kind.is_pathlike() {
                Err(collision_error(ctx))
            } else {
                Ok(Outcome::KeptLeft)
            }
        }
        Strategy::AcceptLeft => {
            warn_accept(io.warnings, ctx, Resolution::KeptLeft);
            Ok(Outcome::KeptLeft)
        }
        Strategy::AcceptRight => {
            warn_accept(io.warnings, ctx, Resolution::KeptRight);
            Ok(Outcome::KeptRight)
        }
        Strategy::RenameLeft => renamed(options, io, ctx, Side::Left),
        Strategy::RenameRight => renamed(options, io, ctx, Side::Right),
        Strategy::Deduplicate => {
            if ctx.kind != CollisionKind::Schema {
                return Ok(Outcome::KeptLeft);
            }

            deduplicate(options, io, ctx)
        }
    }
}

fn renamed(
    options: &JoinerOptions,
    io: &mut EngineIo<'_>,
    ctx: &CollisionContext<'_>,
    side: Side,
) -> Result<Outcome, Error> {
    if ctx.kind.is_pathlike() {
        return Err(Error::ResolutionNotSupportedForPaths(
            "ResolutionRename".to_string(),
        ));
    }

    // rename strategies only carry meaning for schemas, any other
    // component keeps the existing value
    if ctx.kind != CollisionKind::Schema {
        return Ok(Outcome::KeptLeft);
    }

    Ok(Outcome::Renamed {
        side,
        new_name: generate_name(options, io.namer, ctx, side),
    })
}

fn deduplicate(
    options: &JoinerOptions,
    io: &mut EngineIo<'_>,
    ctx: &CollisionContext<'_>,
) -> Result<Outcome, Error> {
    if options.equivalence_mode == EquivalenceMode::None {
        return Err(Error::DeduplicateWithoutEquivalence);
    }

    let (equivalent, differences) =
        (options.oracle)(ctx.left, ctx.right, options.equivalence_mode);

    if !equivalent {
        return Err(Error::NotEquivalent {
            name: ctx.name.to_string(),
            differences,
        });
    }

    io.warnings.add_at(
        WarningCategory::SchemaDeduplicated,
        format!("schema {} deduplicated, kept from first document", ctx.name),
        &ctx.json_path,
        ctx.right_location,
    );

    Ok(Outcome::Deduplicated)
}

fn generate_name(
    options: &JoinerOptions,
    namer: &NameGenerator,
    ctx: &CollisionContext<'_>,
    side: Side,
) -> String {
    // on collision the prefix only applies to the renamed incoming
    // side, left renames always go through the template
    if side == Side::Right {
        if let Some(prefix) = options.namespace_prefix.get(ctx.right_source) {
            return format!("{prefix}_{}", ctx.name);
        }
    }

    let context = match side {
        // left renames always belong to the first document and carry
        // no operation graph
        Side::Left => RenameContext::new(ctx.name, ctx.left_source, 0),
        Side::Right => match ctx.rename_hint {
            Some(hint) => hint.clone(),
            None => RenameContext::new(ctx.name, ctx.right_source, 0),
        },
    };

    namer.generate(&context)
}

fn warn_accept(warnings: &mut Warnings, ctx: &CollisionContext<'_>, resolution: Resolution) {
    let action = match resolution {
        Resolution::KeptLeft => "kept from first document",
        _ => "overwritten",
    };

    warnings.add_at(
        ctx.kind.warning_category(),
        format!("{} {} {action}", ctx.kind, ctx.name),
        &ctx.json_path,
        ctx.right_location,
    );
}

fn collision_error(ctx: &CollisionContext<'_>) -> Error {
    Error::Collision {
        name: ctx.name.to_string(),
        left_source: ctx.left_source.to_string(),
        left_line: ctx.left_location.0,
        left_column: ctx.left_location.1,
        right_source: ctx.right_source.to_string(),
        right_line: ctx.right_location.0,
        right_column: ctx.right_location.1,
        flag: ctx.kind.flag().to_string(),
    }
}
