// ulogic: featherweight business-rule expressions and templates.
//
// A small domain-specific expression language with a Python-flavored
// surface syntax, evaluated over a weakly-typed value model, plus a
// Mustache-flavored template engine that embeds expressions between
// delimiters.
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod util;

pub mod ast;
pub mod funcs;
pub mod lexer;
pub mod parser;
pub mod template;
pub mod value;
pub mod vm;

pub use ast::{Emit, Node};
pub use template::{Template, TemplateOptions};
pub use value::Value;
pub use vm::{Env, Interpreter};
