use tracing::{debug, info};

use crate::codegen_wasm::encode_module;
use crate::config::CodegenConfig;
use crate::declarations::{BodyLowering, CodegenContext, DeclarationTransformer};
use crate::error::CoreError;
use crate::facades::{FacadeUnit, MultifileFacadeContext, generate_facades};
use crate::index::ModuleIndex;
use crate::ir::{
    Annotated, Declaration, Expr, FileUnit, FunctionDecl, FunctionKind, IdGen, Origin, Visibility,
};
use crate::lower_body::ExprLowerer;
use crate::module::WasmModule;
use crate::type_mapper::{TypeMapper, WasmTypeMapper};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationArtifact {
    pub wasm: Vec<u8>,
    pub module: WasmModule,
    pub facades: Vec<FacadeUnit>,
}

/// Lower and encode `units` with the default type mapping and body lowering.
pub fn compile_units(
    units: Vec<FileUnit>,
    config: &CodegenConfig,
) -> Result<CompilationArtifact, CoreError> {
    compile_with(units, config, &WasmTypeMapper, ExprLowerer)
}

pub fn compile_with<L: BodyLowering>(
    mut units: Vec<FileUnit>,
    config: &CodegenConfig,
    types: &dyn TypeMapper,
    lowering: L,
) -> Result<CompilationArtifact, CoreError> {
    for unit in &mut units {
        unit.link_parents();
    }
    let mut ids = IdGen::after(&units);

    let mut facade_context = MultifileFacadeContext::new();
    for unit in &units {
        for decl in &unit.declarations {
            if let Declaration::Class(class) = decl {
                if let Some(facade) = class.multifile_facade() {
                    debug!(part = %class.name, facade, "registered multifile part");
                    facade_context.register_part(facade, class.clone());
                }
            }
        }
    }

    let index = ModuleIndex::from_units(&units)?;
    let mut ctx = CodegenContext::new(config, types, index);
    let mut transformer = DeclarationTransformer::new(lowering);
    let mut module = WasmModule::new();

    for unit in &units {
        lower_unit(unit, &mut transformer, &mut ctx, &mut module)?;
    }
    info!(
        units = units.len(),
        functions = module.functions.len(),
        globals = module.globals.len(),
        imports = ctx.imports.len(),
        "lowered declarations"
    );

    let facades = if config.generate_facades {
        let facades = generate_facades(&mut facade_context, &mut ids)?;
        for facade in &facades {
            ctx.index.add_unit(&facade.unit)?;
            for copy in &facade.accessor_copies {
                ctx.index.add_detached_property(copy)?;
            }
        }
        for facade in &facades {
            lower_unit(&facade.unit, &mut transformer, &mut ctx, &mut module)?;
        }
        info!(facades = facades.len(), "lowered multifile facades");
        facades
    } else {
        debug!(pending = facade_context.len(), "facade generation disabled");
        Vec::new()
    };

    let deferred = std::mem::take(&mut ctx.deferred_initializers);
    if !deferred.is_empty() {
        let assignments = deferred
            .into_iter()
            .map(|init| Expr::set_field(init.field, init.value))
            .collect();
        let init = FunctionDecl {
            id: ids.fresh()?,
            name: config.init_function_name.clone(),
            kind: FunctionKind::Simple,
            visibility: Visibility::Private,
            origin: Origin::Generated,
            annotations: Vec::new(),
            is_fake_override: false,
            type_params: Vec::new(),
            dispatch_receiver: None,
            extension_receiver: None,
            params: Vec::new(),
            return_type: Type::Unit,
            body: Some(Expr::block(assignments, Type::Unit)),
            accessor: None,
            copied_from: None,
            parent: None,
        };

        ctx.index.add_function(&init, "")?;
        if let Some(field) = transformer.transform_function(&init, &mut ctx)? {
            module.add_field(field);
        }
        let start = ctx.global_name(init.id)?;
        info!(function = %start, "generated initialization routine");
        module.start = Some(start);
    }

    module.imports = std::mem::take(&mut ctx.imports);
    let wasm = encode_module(&module)?;
    info!(bytes = wasm.len(), "encoded module");

    Ok(CompilationArtifact {
        wasm,
        module,
        facades,
    })
}

/// Lower every declaration of `unit`, then the fields and properties of
/// each emitted class.
fn lower_unit<L: BodyLowering>(
    unit: &FileUnit,
    transformer: &mut DeclarationTransformer<L>,
    ctx: &mut CodegenContext<'_>,
    module: &mut WasmModule,
) -> Result<(), CoreError> {
    for decl in &unit.declarations {
        let lowered = transformer.transform(decl, ctx)?;
        let emitted = lowered.is_some();
        if let Some(field) = lowered {
            module.add_field(field);
        }
        let Declaration::Class(class) = decl else {
            continue;
        };
        if !emitted {
            continue;
        }
        for member in &class.members {
            if let Declaration::Field(_) | Declaration::Property(_) = member {
                if let Some(field) = transformer.transform(member, ctx)? {
                    module.add_field(field);
                }
            }
        }
    }
    Ok(())
}
