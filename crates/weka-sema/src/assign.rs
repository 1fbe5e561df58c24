//! Mapping call arguments to declared parameter slots.
//!
//! Each call argument is either positional or keyword-tagged. Assignment
//! resolves every argument to a parameter index before any type checking
//! happens; a call form that cannot be assigned rejects the overload
//! silently (a diagnostic is emitted only when every overload fails).

use weka_ast::Argument;
use weka_types::FunctionType;

/// Why an argument list could not be assigned to a parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    TooManyArguments { expected: usize, got: usize },
    UnknownKeyword { name: String },
    DuplicateBinding { name: String },
    PositionalAfterKeyword,
    MissingRequired { index: usize, name: Option<String> },
}

/// The resolved mapping from argument positions to parameter slots.
#[derive(Debug, Clone, Default)]
pub struct ParameterAssignments {
    /// `mapping[i]` is the parameter index the i-th argument binds.
    mapping: Vec<usize>,
}

impl ParameterAssignments {
    /// Parameter index for the i-th argument.
    pub fn param_for_arg(&self, arg_index: usize) -> Option<usize> {
        self.mapping.get(arg_index).copied()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Assign AST arguments (positional and keyword) to the parameters
    /// of `fn_type`.
    pub fn from_ast(fn_type: &FunctionType, args: &[Argument]) -> Result<Self, AssignError> {
        let params = &fn_type.params;
        let mut bound: Vec<bool> = vec![false; params.len()];
        let mut mapping = Vec::with_capacity(args.len());
        let mut seen_keyword = false;
        let mut next_positional = 0usize;

        for arg in args {
            if let Some(keyword) = &arg.keyword {
                seen_keyword = true;
                let name = keyword.node.as_str();
                let Some(index) = params
                    .iter()
                    .position(|p| p.name.as_deref() == Some(name))
                else {
                    return Err(AssignError::UnknownKeyword {
                        name: name.to_string(),
                    });
                };
                if bound[index] {
                    return Err(AssignError::DuplicateBinding {
                        name: name.to_string(),
                    });
                }
                bound[index] = true;
                mapping.push(index);
                continue;
            }

            if seen_keyword {
                return Err(AssignError::PositionalAfterKeyword);
            }

            while next_positional < params.len() && bound[next_positional] {
                next_positional += 1;
            }
            if next_positional >= params.len() {
                // A trailing variadic parameter absorbs the overflow.
                match params.last() {
                    Some(last) if last.is_variadic => {
                        mapping.push(params.len() - 1);
                        continue;
                    }
                    _ => {
                        return Err(AssignError::TooManyArguments {
                            expected: params.len(),
                            got: args.len(),
                        });
                    }
                }
            }
            bound[next_positional] = true;
            mapping.push(next_positional);
            next_positional += 1;
        }

        for (index, param) in params.iter().enumerate() {
            if bound[index] || param.has_default || param.is_variadic {
                continue;
            }
            return Err(AssignError::MissingRequired {
                index,
                name: param.name.clone(),
            });
        }

        Ok(Self { mapping })
    }

    /// Assign `count` positional arguments. Used for calls whose
    /// arguments were already reduced to IR (coercer calls, super calls).
    pub fn positional(fn_type: &FunctionType, count: usize) -> Result<Self, AssignError> {
        let params = &fn_type.params;
        let variadic = params.last().map_or(false, |p| p.is_variadic);
        if count > params.len() && !variadic {
            return Err(AssignError::TooManyArguments {
                expected: params.len(),
                got: count,
            });
        }
        let required = params
            .iter()
            .filter(|p| !p.has_default && !p.is_variadic)
            .count();
        if count < required {
            return Err(AssignError::MissingRequired {
                index: count,
                name: params.get(count).and_then(|p| p.name.clone()),
            });
        }
        Ok(Self {
            mapping: (0..count).map(|i| i.min(params.len() - 1)).collect(),
        })
    }
}
