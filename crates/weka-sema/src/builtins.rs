//! The built-in type registry.
//!
//! One registry is built per compilation and passed into analyzer
//! construction. It installs the canonical `Object` base class, `String`,
//! the `Array[T]` template, `Throwable`, the reflection-meta `TypeInfo`
//! class, and the well-known runtime support functions into a scope that
//! becomes the parent of the module's root scope.

use weka_types::{
    CompositeKind, CompositeRef, DefnId, FunctionType, Param, Primitive, ScopeId, Type,
};

use crate::defn::{
    CompositeInfo, Defn, DefnKind, DefnTraits, Dispatch, FunctionInfo, StorageClass, TemplateInfo,
    TypeDefnInfo,
};
use crate::module::Module;
use crate::scope::ScopeData;

/// Names the analyzer looks up by identity.
pub mod well_known {
    pub const CONSTRUCT: &str = "construct";
    pub const CREATE: &str = "create";
    pub const COERCE: &str = "coerce";
    pub const HAS_BASE: &str = "hasBase";
    pub const TYPECAST_ERROR: &str = "typecastError";
}

/// Canonical built-in definitions for one compilation.
pub struct Builtins {
    /// Scope holding the built-in definitions; parent of the module's
    /// root scope.
    pub scope: ScopeId,
    pub object: DefnId,
    pub string: DefnId,
    pub array: DefnId,
    pub throwable: DefnId,
    pub type_info: DefnId,
    pub has_base: DefnId,
    pub typecast_error: DefnId,
    pub object_type: Type,
    pub string_type: Type,
    pub throwable_type: Type,
    pub type_info_type: Type,
}

impl Builtins {
    /// Install the built-in definitions into `module` and re-point the
    /// module's root scope under the built-in scope.
    pub fn install(module: &mut Module) -> Builtins {
        let scope = module.add_scope(ScopeData::iterable(None).named("builtins"));
        module.scope_mut(module.root_scope).parent = Some(scope);

        let (object, object_type) =
            define_class(module, scope, "Object", CompositeKind::Class, vec![]);
        let (string, string_type) = define_class(
            module,
            scope,
            "String",
            CompositeKind::Class,
            vec![object_type.clone()],
        );
        let (throwable, throwable_type) = define_class(
            module,
            scope,
            "Throwable",
            CompositeKind::Class,
            vec![object_type.clone()],
        );
        let (type_info, type_info_type) = define_class(
            module,
            scope,
            "TypeInfo",
            CompositeKind::Class,
            vec![object_type.clone()],
        );

        // String gets its copy constructor.
        add_ctor(
            module,
            string,
            FunctionType::new(
                vec![Param::new("value", string_type.clone())],
                Type::void(),
            )
            .with_self(string_type.clone()),
        );

        let array = define_array_template(module, scope, &object_type);

        let has_base = define_support_fn(
            module,
            scope,
            well_known::HAS_BASE,
            FunctionType::new(
                vec![
                    Param::new("object", object_type.clone()),
                    Param::new("base", type_info_type.clone()),
                ],
                Type::bool_type(),
            ),
        );
        let typecast_error = define_support_fn(
            module,
            scope,
            well_known::TYPECAST_ERROR,
            FunctionType::new(vec![], Type::void()),
        );

        Builtins {
            scope,
            object,
            string,
            array,
            throwable,
            type_info,
            has_base,
            typecast_error,
            object_type,
            string_type,
            throwable_type,
            type_info_type,
        }
    }

    /// The `Array[element]` instance type.
    pub fn array_of(&self, module: &Module, element: Type) -> Type {
        Type::Composite(CompositeRef {
            name: module.defn(self.array).name.clone(),
            kind: CompositeKind::Class,
            defn: self.array,
            args: vec![element],
        })
    }
}

fn define_class(
    module: &mut Module,
    scope: ScopeId,
    name: &str,
    kind: CompositeKind,
    supers: Vec<Type>,
) -> (DefnId, Type) {
    let members = module.add_scope(
        ScopeData::iterable(Some(scope)).named(format!("{name} members")),
    );
    let id = module.add_defn(Defn::new(
        name,
        StorageClass::Global,
        DefnKind::Type(TypeDefnInfo {
            ty: Type::Bad,
            composite: Some(CompositeInfo {
                kind,
                supers,
                members,
                instance_fields: Vec::new(),
                coercers: Vec::new(),
            }),
        }),
    ));
    let ty = Type::Composite(CompositeRef {
        name: name.to_string(),
        kind,
        defn: id,
        args: Vec::new(),
    });
    if let DefnKind::Type(info) = &mut module.defn_mut(id).kind {
        info.ty = ty.clone();
    }
    module.scope_mut(members).owner = Some(id);
    module
        .add_symbol(scope, id)
        .expect("built-in type names are unique");
    (id, ty)
}

fn define_array_template(module: &mut Module, scope: ScopeId, object_type: &Type) -> DefnId {
    let template = TemplateInfo::new(&["T"]);
    let element = Type::PatternVar(template.params[0].clone());

    let members = module.add_scope(ScopeData::iterable(Some(scope)).named("Array members"));
    let id = module.add_defn(Defn::new(
        "Array",
        StorageClass::Global,
        DefnKind::Type(TypeDefnInfo {
            ty: Type::Bad,
            composite: Some(CompositeInfo {
                kind: CompositeKind::Class,
                supers: vec![object_type.clone()],
                members,
                instance_fields: Vec::new(),
                coercers: Vec::new(),
            }),
        }),
    ));
    let ty = Type::Composite(CompositeRef {
        name: "Array".to_string(),
        kind: CompositeKind::Class,
        defn: id,
        args: vec![element.clone()],
    });
    {
        let defn = module.defn_mut(id);
        defn.traits.insert(DefnTraits::TEMPLATE);
        defn.template = Some(template);
        if let DefnKind::Type(info) = &mut defn.kind {
            info.ty = ty.clone();
        }
    }
    module.scope_mut(members).owner = Some(id);
    module
        .add_symbol(scope, id)
        .expect("built-in type names are unique");

    // Array[T].construct(length: i64)
    add_ctor(
        module,
        id,
        FunctionType::new(
            vec![Param::new("length", Type::Primitive(Primitive::I64))],
            Type::void(),
        )
        .with_self(ty),
    );
    id
}

fn add_ctor(module: &mut Module, type_defn: DefnId, ty: FunctionType) {
    let members = module
        .defn(type_defn)
        .composite_info()
        .expect("constructor target is a composite")
        .members;
    let mut ctor = Defn::new(
        well_known::CONSTRUCT,
        StorageClass::Instance,
        DefnKind::Function(FunctionInfo {
            ty,
            dispatch: Dispatch::Direct,
            entry: None,
        }),
    );
    ctor.traits.insert(DefnTraits::CTOR);
    ctor.qualified_name = format!(
        "{}.{}",
        module.defn(type_defn).name,
        well_known::CONSTRUCT
    );
    let id = module.add_defn(ctor);
    module
        .add_symbol(members, id)
        .expect("member scopes allow overloads");
}

fn define_support_fn(
    module: &mut Module,
    scope: ScopeId,
    name: &str,
    ty: FunctionType,
) -> DefnId {
    let id = module.add_defn(Defn::function(name, StorageClass::Global, ty));
    module
        .add_symbol(scope, id)
        .expect("built-in function names are unique");
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_registers_canonical_classes() {
        let mut module = Module::new("main");
        let builtins = Builtins::install(&mut module);

        assert_eq!(module.defn(builtins.object).name, "Object");
        assert!(module.defn(builtins.array).is_template());
        assert_eq!(
            module.scope(module.root_scope).parent,
            Some(builtins.scope)
        );

        // String inherits from Object.
        assert!(module.is_subtype(&builtins.string_type, &builtins.object_type));

        // String.construct is visible without inheritance.
        let members = module
            .defn(builtins.string)
            .composite_info()
            .unwrap()
            .members;
        assert!(module
            .lookup_single_member(members, well_known::CONSTRUCT, false)
            .is_some());
    }

    #[test]
    fn array_instances_substitute_the_element() {
        let mut module = Module::new("main");
        let builtins = Builtins::install(&mut module);
        let arr = builtins.array_of(&module, Type::Primitive(Primitive::I32));
        assert_eq!(arr.to_string(), "Array[i32]");
        assert!(arr.is_singular());
        assert!(module.is_subtype(&arr, &builtins.object_type));
    }
}
