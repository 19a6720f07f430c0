//! Visits every place a parsed class stores a `CONSTANT_Utf8` index, along
//! with how that place interprets the string.
//!
//! The walk order is fixed, so two walks over the same class line up visit
//! for visit. Indexes that point at non-Utf8 constants (numeric annotation
//! values, `CONSTANT_Module` operands of the Module attribute) are skipped.

use ristretto_classfile::attributes::{Annotation, AnnotationElement, AnnotationValuePair, Attribute};
use ristretto_classfile::{ClassFile, Constant, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    /// `CONSTANT_Class` name: internal name or array descriptor.
    ClassName,
    /// Field, method or annotation type descriptor.
    Descriptor,
    /// Generic signature.
    Signature,
    /// String value (`CONSTANT_String`, annotation string).
    Value,
    /// `CONSTANT_Package` name, slashed.
    Package,
    /// Member, attribute or module name; must keep its exact bytes.
    Name,
}

pub(crate) type Visitor<'a> = dyn FnMut(&mut u16, Role) + 'a;

pub(crate) fn references(class: &mut ClassFile, visit: &mut Visitor<'_>) -> Result<()> {
    let pool = &mut class.constant_pool;
    let count = u16::try_from(pool.len())?;
    for index in 1..=count {
        let Some(constant) = pool.get(index) else {
            continue;
        };
        let updated = match constant.clone() {
            Constant::Class(mut name) => {
                visit(&mut name, Role::ClassName);
                Constant::Class(name)
            }
            Constant::String(mut value) => {
                visit(&mut value, Role::Value);
                Constant::String(value)
            }
            Constant::NameAndType {
                mut name_index,
                mut descriptor_index,
            } => {
                visit(&mut name_index, Role::Name);
                visit(&mut descriptor_index, Role::Descriptor);
                Constant::NameAndType {
                    name_index,
                    descriptor_index,
                }
            }
            Constant::MethodType(mut descriptor) => {
                visit(&mut descriptor, Role::Descriptor);
                Constant::MethodType(descriptor)
            }
            Constant::Module(mut name) => {
                visit(&mut name, Role::Name);
                Constant::Module(name)
            }
            Constant::Package(mut name) => {
                visit(&mut name, Role::Package);
                Constant::Package(name)
            }
            _ => continue,
        };
        if pool.get(index) != Some(&updated) {
            pool.set(index, updated)?;
        }
    }

    for field in &mut class.fields {
        visit(&mut field.name_index, Role::Name);
        visit(&mut field.descriptor_index, Role::Descriptor);
        walk_attributes(&mut field.attributes, visit);
    }
    for method in &mut class.methods {
        visit(&mut method.name_index, Role::Name);
        visit(&mut method.descriptor_index, Role::Descriptor);
        walk_attributes(&mut method.attributes, visit);
    }
    walk_attributes(&mut class.attributes, visit);
    Ok(())
}

fn walk_attributes(attributes: &mut [Attribute], visit: &mut Visitor<'_>) {
    for attribute in attributes {
        visit(attribute_name(attribute), Role::Name);
        match attribute {
            Attribute::Code { attributes: nested, .. } => walk_attributes(nested, visit),
            Attribute::Signature {
                signature_index, ..
            } => visit(signature_index, Role::Signature),
            Attribute::SourceFile {
                source_file_index, ..
            } => visit(source_file_index, Role::Name),
            Attribute::InnerClasses { classes, .. } => {
                for class in classes {
                    visit(&mut class.name_index, Role::Name);
                }
            }
            Attribute::LocalVariableTable { variables, .. } => {
                for variable in variables {
                    visit(&mut variable.name_index, Role::Name);
                    visit(&mut variable.descriptor_index, Role::Descriptor);
                }
            }
            Attribute::LocalVariableTypeTable { variable_types, .. } => {
                for variable in variable_types {
                    visit(&mut variable.name_index, Role::Name);
                    visit(&mut variable.signature_index, Role::Signature);
                }
            }
            Attribute::RuntimeVisibleAnnotations { annotations, .. }
            | Attribute::RuntimeInvisibleAnnotations { annotations, .. } => {
                for a in annotations {
                    annotation(a, visit);
                }
            }
            Attribute::RuntimeVisibleParameterAnnotations {
                parameter_annotations,
                ..
            }
            | Attribute::RuntimeInvisibleParameterAnnotations {
                parameter_annotations,
                ..
            } => {
                for parameter in parameter_annotations {
                    for a in &mut parameter.annotations {
                        annotation(a, visit);
                    }
                }
            }
            Attribute::RuntimeVisibleTypeAnnotations {
                type_annotations, ..
            }
            | Attribute::RuntimeInvisibleTypeAnnotations {
                type_annotations, ..
            } => {
                for a in type_annotations {
                    visit(&mut a.type_index, Role::Descriptor);
                    pairs(&mut a.elements, visit);
                }
            }
            Attribute::AnnotationDefault { element: value, .. } => element(value, visit),
            Attribute::MethodParameters { parameters, .. } => {
                for parameter in parameters {
                    visit(&mut parameter.name_index, Role::Name);
                }
            }
            Attribute::Module {
                version_index,
                requires,
                ..
            } => {
                visit(version_index, Role::Name);
                for require in requires {
                    visit(&mut require.version_index, Role::Name);
                }
            }
            Attribute::Record { records, .. } => {
                for record in records {
                    visit(&mut record.name_index, Role::Name);
                    visit(&mut record.descriptor_index, Role::Descriptor);
                    walk_attributes(&mut record.attributes, visit);
                }
            }
            _ => {}
        }
    }
}

fn annotation(annotation: &mut Annotation, visit: &mut Visitor<'_>) {
    visit(&mut annotation.type_index, Role::Descriptor);
    pairs(&mut annotation.elements, visit);
}

fn pairs(pairs: &mut [AnnotationValuePair], visit: &mut Visitor<'_>) {
    for pair in pairs {
        visit(&mut pair.name_index, Role::Name);
        element(&mut pair.value, visit);
    }
}

fn element(value: &mut AnnotationElement, visit: &mut Visitor<'_>) {
    match value {
        AnnotationElement::String { const_value_index } => visit(const_value_index, Role::Value),
        AnnotationElement::Enum {
            type_name_index,
            const_name_index,
        } => {
            visit(type_name_index, Role::Descriptor);
            visit(const_name_index, Role::Name);
        }
        // return descriptor, e.g. `Lcom/foo/Bar;` or `V`
        AnnotationElement::Class { class_info_index } => visit(class_info_index, Role::Descriptor),
        AnnotationElement::Annotation { annotation: nested } => annotation(nested, visit),
        AnnotationElement::Array { values } => {
            for v in values {
                element(v, visit);
            }
        }
        _ => {}
    }
}

fn attribute_name(attribute: &mut Attribute) -> &mut u16 {
    match attribute {
        Attribute::ConstantValue { name_index, .. }
        | Attribute::Code { name_index, .. }
        | Attribute::StackMapTable { name_index, .. }
        | Attribute::Exceptions { name_index, .. }
        | Attribute::InnerClasses { name_index, .. }
        | Attribute::EnclosingMethod { name_index, .. }
        | Attribute::Synthetic { name_index }
        | Attribute::Signature { name_index, .. }
        | Attribute::SourceFile { name_index, .. }
        | Attribute::SourceDebugExtension { name_index, .. }
        | Attribute::LineNumberTable { name_index, .. }
        | Attribute::LocalVariableTable { name_index, .. }
        | Attribute::LocalVariableTypeTable { name_index, .. }
        | Attribute::Deprecated { name_index }
        | Attribute::RuntimeVisibleAnnotations { name_index, .. }
        | Attribute::RuntimeInvisibleAnnotations { name_index, .. }
        | Attribute::RuntimeVisibleParameterAnnotations { name_index, .. }
        | Attribute::RuntimeInvisibleParameterAnnotations { name_index, .. }
        | Attribute::RuntimeVisibleTypeAnnotations { name_index, .. }
        | Attribute::RuntimeInvisibleTypeAnnotations { name_index, .. }
        | Attribute::AnnotationDefault { name_index, .. }
        | Attribute::BootstrapMethods { name_index, .. }
        | Attribute::MethodParameters { name_index, .. }
        | Attribute::Module { name_index, .. }
        | Attribute::ModulePackages { name_index, .. }
        | Attribute::ModuleMainClass { name_index, .. }
        | Attribute::NestHost { name_index, .. }
        | Attribute::NestMembers { name_index, .. }
        | Attribute::Record { name_index, .. }
        | Attribute::PermittedSubclasses { name_index, .. }
        | Attribute::Unknown { name_index, .. } => name_index,
    }
}
