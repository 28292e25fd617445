//! Recursive-descent parser producing the typed-but-unchecked AST and
//! populating the [`SymbolTable`] as it goes.
//!
//! `original_source/src/parser.c` is, per spec.md §9's note, a toy
//! arithmetic-expression calculator rather than this language's real
//! grammar, so the grammar below is grounded instead in the node shapes
//! `ast.h` declares, the entry kinds `symbol_table.h` declares, and the
//! consumption patterns `sema.c`/`codegen.c` exercise. Declarations enter
//! the symbol table immediately as they are parsed, matching this
//! project's single-pass design (spec.md §4.1/§4.4).

use std::rc::Rc;

use crate::error::{Error, Result};
use crate::lexer::{Kw, Tok, Token};
use crate::preprocessor::Flattened;
use crate::symbol::{FuncEntry, Scope, ScopeId, SymbolAttr, SymbolEntry, SymbolTable, UserTypeEntry};
use crate::types::ast::{BinOp, ExprKind, ExprNode, LoopCtl, Stmt, StmtKind, TypeRef, UnOp};
use crate::types::source::SourcePos;
use crate::types::ty::{CallConv, Primitive, Type, MAX_ALIGNMENT};

fn err(pos: SourcePos, message: impl Into<String>) -> Error {
    Error::semantic(pos, message)
}

struct Parser<'a> {
    toks: &'a [Token],
    idx: usize,
    flat: &'a Flattened,
    table: &'a mut SymbolTable,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Tok {
        &self.toks[self.idx].tok
    }

    fn peek_at(&self, k: usize) -> &Tok {
        self.toks.get(self.idx + k).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn pos(&self) -> SourcePos {
        let t = &self.toks[self.idx];
        self.flat.pos(t.line, t.col)
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.idx].tok.clone();
        if self.idx + 1 < self.toks.len() {
            self.idx += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> Result<()> {
        if self.peek() == tok {
            self.bump();
            Ok(())
        } else {
            Err(err(self.pos(), format!("expected {tok:?}, found {:?}", self.peek())))
        }
    }

    fn eat_ident(&mut self) -> Result<Rc<str>> {
        match self.bump() {
            Tok::Ident(s) => Ok(s),
            other => Err(err(self.pos(), format!("expected identifier, found {other:?}"))),
        }
    }

    fn at_kw(&self, kw: Kw) -> bool {
        matches!(self.peek(), Tok::Kw(k) if *k == kw)
    }

    // ---- types ---------------------------------------------------------

    /// Whether the current token could begin a [`TypeRef`]: a primitive
    /// keyword, or an identifier already bound to a user type.
    fn is_type_start(&self) -> bool {
        match self.peek() {
            Tok::Kw(kw) => kw.as_primitive().is_some(),
            Tok::Ident(name) => matches!(self.table.find(self.table.global(), name, false), Some(SymbolEntry::Type(_))),
            _ => false,
        }
    }

    fn parse_type_ref(&mut self) -> Result<TypeRef> {
        let pos = self.pos();
        let mut ty = match self.bump() {
            Tok::Kw(kw) => {
                let Some(p) = kw.as_primitive() else {
                    return Err(err(pos, "expected a type"));
                };
                Type::primitive(p)
            }
            Tok::Ident(name) => match self.table.find(self.table.global(), &name, false) {
                Some(SymbolEntry::Type(id)) => {
                    let id = *id;
                    let entry = self.table.user_type(id);
                    Type::user(id, entry.size, entry.alignment)
                }
                _ => return Err(err(pos, format!("'{name}' does not name a type"))),
            },
            other => return Err(err(pos, format!("expected a type, found {other:?}"))),
        };

        let mut levels = 0u32;
        while matches!(self.peek(), Tok::Star) {
            self.bump();
            levels += 1;
        }
        if levels > 0 {
            ty = Type::pointer(ty, levels);
        }

        if matches!(self.peek(), Tok::LBracket) {
            self.bump();
            let size = if let Tok::Int(n) = self.peek() {
                let n = *n as u32;
                self.bump();
                n
            } else {
                0
            };
            self.eat(&Tok::RBracket)?;
            ty = Type::array(ty, size);
        }

        Ok(TypeRef { pos, data_type: ty })
    }

    // ---- expressions ----------------------------------------------------

    fn parse_expr(&mut self, scope: ScopeId) -> Result<ExprNode> {
        let mut node = self.parse_assign(scope)?;
        while matches!(self.peek(), Tok::Comma) {
            let pos = self.pos();
            self.bump();
            let right = self.parse_assign(scope)?;
            node = ExprNode::new(pos, ExprKind::Binary { op: BinOp::Comma, left: Box::new(node), right: Box::new(right) });
        }
        Ok(node)
    }

    fn parse_assign(&mut self, scope: ScopeId) -> Result<ExprNode> {
        let target = self.parse_logic_or(scope)?;
        if matches!(self.peek(), Tok::Eq) {
            let pos = self.pos();
            self.bump();
            let value = self.parse_assign(scope)?;
            return Ok(ExprNode::new(pos, ExprKind::Assign { target: Box::new(target), value: Box::new(value), from_decl: false }));
        }
        Ok(target)
    }

    fn parse_binop_level(&mut self, scope: ScopeId, ops: &[(Tok, BinOp)], next: fn(&mut Self, ScopeId) -> Result<ExprNode>) -> Result<ExprNode> {
        let mut node = next(self, scope)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.peek() == tok {
                    let pos = self.pos();
                    self.bump();
                    let right = next(self, scope)?;
                    node = ExprNode::new(pos, ExprKind::Binary { op: *op, left: Box::new(node), right: Box::new(right) });
                    continue 'outer;
                }
            }
            break;
        }
        Ok(node)
    }

    fn parse_logic_or(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::PipePipe, BinOp::LOr)], Self::parse_logic_and)
    }

    fn parse_logic_and(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::AmpAmp, BinOp::LAnd)], Self::parse_equality)
    }

    fn parse_equality(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::EqEq, BinOp::Eq), (Tok::BangEq, BinOp::Ne)], Self::parse_relational)
    }

    fn parse_relational(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(
            scope,
            &[(Tok::Lt, BinOp::Lt), (Tok::LtEq, BinOp::Le), (Tok::Gt, BinOp::Gt), (Tok::GtEq, BinOp::Ge)],
            Self::parse_bitor,
        )
    }

    fn parse_bitor(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::Pipe, BinOp::Or)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::Caret, BinOp::Xor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::Amp, BinOp::And)], Self::parse_shift)
    }

    fn parse_shift(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::LtLt, BinOp::Shl), (Tok::GtGt, BinOp::Shr)], Self::parse_additive)
    }

    fn parse_additive(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::Plus, BinOp::Add), (Tok::Minus, BinOp::Sub)], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self, scope: ScopeId) -> Result<ExprNode> {
        self.parse_binop_level(scope, &[(Tok::Star, BinOp::Mul), (Tok::Slash, BinOp::Div), (Tok::Percent, BinOp::Mod)], Self::parse_cast)
    }

    fn parse_cast(&mut self, scope: ScopeId) -> Result<ExprNode> {
        let mut node = self.parse_unary(scope)?;
        while self.at_kw(Kw::As) {
            let pos = self.pos();
            self.bump();
            let ty = self.parse_type_ref()?;
            node = ExprNode::new(pos, ExprKind::Cast { data_type: ty.data_type, expr: Box::new(node) });
        }
        Ok(node)
    }

    fn parse_unary(&mut self, scope: ScopeId) -> Result<ExprNode> {
        let pos = self.pos();
        let op = match self.peek() {
            Tok::Plus => Some(UnOp::Plus),
            Tok::Minus => Some(UnOp::Neg),
            Tok::Tilde => Some(UnOp::BitNot),
            Tok::Bang => Some(UnOp::Not),
            Tok::Star => Some(UnOp::Deref),
            Tok::Amp => Some(UnOp::AddrOf),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary(scope)?;
            return Ok(ExprNode::new(pos, ExprKind::Unary { op, operand: Box::new(operand) }));
        }
        self.parse_postfix(scope)
    }

    fn parse_postfix(&mut self, scope: ScopeId) -> Result<ExprNode> {
        let mut node = self.parse_primary(scope)?;
        loop {
            match self.peek() {
                Tok::LBracket => {
                    let pos = self.pos();
                    self.bump();
                    let index = self.parse_expr(scope)?;
                    self.eat(&Tok::RBracket)?;
                    node = ExprNode::new(pos, ExprKind::Index { base: Box::new(node), index: Box::new(index) });
                }
                Tok::Dot => {
                    let pos = self.pos();
                    self.bump();
                    let ident = self.eat_ident()?;
                    node = ExprNode::new(pos, ExprKind::Field { base: Box::new(node), ident });
                }
                Tok::LParen => {
                    let pos = self.pos();
                    self.bump();
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Tok::RParen) {
                        loop {
                            args.push(self.parse_assign(scope)?);
                            if matches!(self.peek(), Tok::Comma) {
                                self.bump();
                            } else {
                                break;
                            }
                        }
                    }
                    self.eat(&Tok::RParen)?;
                    node = ExprNode::new(pos, ExprKind::Call { callee: Box::new(node), args });
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn parse_primary(&mut self, scope: ScopeId) -> Result<ExprNode> {
        let pos = self.pos();
        match self.bump() {
            Tok::Int(v) => Ok(ExprNode::new(pos, ExprKind::IntLit { val: v, data_type: Primitive::I32 })),
            Tok::Str(s) => Ok(ExprNode::new(pos, ExprKind::StrLit(s))),
            Tok::Kw(Kw::True) => Ok(ExprNode::new(pos, ExprKind::IntLit { val: 1, data_type: Primitive::Bool })),
            Tok::Kw(Kw::False) => Ok(ExprNode::new(pos, ExprKind::IntLit { val: 0, data_type: Primitive::Bool })),
            Tok::Kw(Kw::Null) => Ok(ExprNode::new(pos, ExprKind::IntLit { val: 0, data_type: Primitive::Void })),
            Tok::Ident(name) => Ok(ExprNode::new(pos, ExprKind::Var { ident: name, scope })),
            Tok::LParen => {
                let inner = self.parse_expr(scope)?;
                self.eat(&Tok::RParen)?;
                Ok(inner)
            }
            other => Err(err(pos, format!("expected an expression, found {other:?}"))),
        }
    }

    // ---- statements -------------------------------------------------

    fn parse_block(&mut self, parent: ScopeId) -> Result<Stmt> {
        let pos = self.pos();
        self.eat(&Tok::LBrace)?;
        // Slot 0 is the saved %ebp (matching `codegen.c`'s "local 1 [ebp]-4"
        // frame layout): a freshly entered function/entry scope's offset
        // starts at 0, so the first local declared with no preceding
        // arguments must still begin at 4, never at 0 (which would alias
        // the saved frame pointer and corrupt it on `leave`).
        let parent_offset = self.table.scope(parent).current_offset().max(4);
        let stack_size = self.table.scope(parent).shared_stack_size();
        let block_scope = self.table.push_scope(Scope::new_block(parent, parent_offset, stack_size));
        let mut stmts = Vec::new();
        while !matches!(self.peek(), Tok::RBrace) {
            stmts.push(self.parse_stmt(block_scope)?);
        }
        self.eat(&Tok::RBrace)?;
        Ok(Stmt { pos, kind: StmtKind::Stmts(stmts) })
    }

    fn parse_stmt(&mut self, scope: ScopeId) -> Result<Stmt> {
        let pos = self.pos();
        match self.peek() {
            Tok::LBrace => self.parse_block(scope),
            Tok::Kw(Kw::If) => {
                self.bump();
                self.eat(&Tok::LParen)?;
                let cond = self.parse_expr(scope)?;
                self.eat(&Tok::RParen)?;
                let then_block = Box::new(self.parse_stmt(scope)?);
                let else_block = if self.at_kw(Kw::Else) {
                    self.bump();
                    Some(Box::new(self.parse_stmt(scope)?))
                } else {
                    None
                };
                Ok(Stmt { pos, kind: StmtKind::If { cond, then_block, else_block } })
            }
            Tok::Kw(Kw::While) => {
                self.bump();
                self.eat(&Tok::LParen)?;
                let cond = self.parse_expr(scope)?;
                self.eat(&Tok::RParen)?;
                let body = Box::new(self.parse_stmt(scope)?);
                Ok(Stmt { pos, kind: StmtKind::While { cond, post: None, body } })
            }
            Tok::Kw(Kw::Break) => {
                self.bump();
                self.eat(&Tok::Semi)?;
                Ok(Stmt { pos, kind: StmtKind::Goto(LoopCtl::Break) })
            }
            Tok::Kw(Kw::Continue) => {
                self.bump();
                self.eat(&Tok::Semi)?;
                Ok(Stmt { pos, kind: StmtKind::Goto(LoopCtl::Continue) })
            }
            Tok::Kw(Kw::Return) => {
                self.bump();
                let expr = if matches!(self.peek(), Tok::Semi) { None } else { Some(self.parse_expr(scope)?) };
                self.eat(&Tok::Semi)?;
                Ok(Stmt { pos, kind: StmtKind::Return(expr) })
            }
            Tok::Kw(Kw::Print) => {
                self.bump();
                self.eat(&Tok::LParen)?;
                let fmt = match self.bump() {
                    Tok::Str(s) => s,
                    other => return Err(err(pos, format!("expected a format string, found {other:?}"))),
                };
                let mut args = Vec::new();
                while matches!(self.peek(), Tok::Comma) {
                    self.bump();
                    args.push(self.parse_assign(scope)?);
                }
                self.eat(&Tok::RParen)?;
                self.eat(&Tok::Semi)?;
                Ok(Stmt { pos, kind: StmtKind::Print { fmt, args } })
            }
            Tok::Kw(Kw::Asm) => {
                self.bump();
                self.eat(&Tok::LParen)?;
                let text = match self.bump() {
                    Tok::Str(s) => s,
                    other => return Err(err(pos, format!("expected a string literal, found {other:?}"))),
                };
                self.eat(&Tok::RParen)?;
                self.eat(&Tok::Semi)?;
                Ok(Stmt { pos, kind: StmtKind::Asm(text) })
            }
            _ if self.is_type_start() => self.parse_local_var_decl(scope),
            _ => {
                let e = self.parse_expr(scope)?;
                self.eat(&Tok::Semi)?;
                Ok(Stmt { pos, kind: StmtKind::Expr(e) })
            }
        }
    }

    fn parse_local_var_decl(&mut self, scope: ScopeId) -> Result<Stmt> {
        let pos = self.pos();
        let ty = self.parse_type_ref()?;
        let name = self.eat_ident()?;
        self.table.scope_mut(scope).append_var(name.clone(), false, SymbolAttr::None, ty.data_type, pos);

        let stmt = if matches!(self.peek(), Tok::Eq) {
            self.bump();
            let value = self.parse_assign(scope)?;
            let target = ExprNode::new(pos, ExprKind::Var { ident: name, scope });
            let assign = ExprNode::new(pos, ExprKind::Assign { target: Box::new(target), value: Box::new(value), from_decl: true });
            Stmt { pos, kind: StmtKind::Expr(assign) }
        } else {
            Stmt { pos, kind: StmtKind::Stmts(Vec::new()) }
        };
        self.eat(&Tok::Semi)?;
        Ok(stmt)
    }

    // ---- top-level items ----------------------------------------------

    fn parse_attrs(&mut self) -> (SymbolAttr, CallConv) {
        let mut attr = SymbolAttr::None;
        let mut call_conv = CallConv::Cdecl;
        loop {
            match self.peek() {
                Tok::Kw(Kw::Export) => {
                    attr = SymbolAttr::Export;
                    self.bump();
                }
                Tok::Kw(Kw::Extern) => {
                    attr = SymbolAttr::Extern;
                    self.bump();
                }
                Tok::Kw(Kw::Cdecl) => {
                    call_conv = CallConv::Cdecl;
                    self.bump();
                }
                Tok::Kw(Kw::Stdcall) => {
                    call_conv = CallConv::Stdcall;
                    self.bump();
                }
                Tok::Kw(Kw::Thiscall) => {
                    call_conv = CallConv::Thiscall;
                    self.bump();
                }
                _ => break,
            }
        }
        (attr, call_conv)
    }

    fn parse_type_decl(&mut self) -> Result<()> {
        let pos = self.pos();
        self.eat(&Tok::Kw(Kw::Type))?;
        let name = self.eat_ident()?;
        self.eat(&Tok::LBrace)?;

        let field_scope_id = self.table.push_scope(Scope::new_global());
        let user_id = self.table.register_user_type(UserTypeEntry { incomplete: true, size: 0, alignment: 0, field_scope: field_scope_id });
        self.table.scope_mut(self.table.global()).append_type(name, user_id, pos);

        let mut offset = 0u32;
        let mut alignment = 1u32;
        while !matches!(self.peek(), Tok::RBrace) {
            let field_ty = self.parse_type_ref()?;
            let field_name = self.eat_ident()?;
            self.eat(&Tok::Semi)?;
            let field_align = field_ty.data_type.alignment.min(MAX_ALIGNMENT).max(1);
            offset = (offset + field_align - 1) / field_align * field_align;
            alignment = alignment.max(field_align);
            let field_size = field_ty.data_type.size;
            self.table.scope_mut(field_scope_id).append_field(field_name, offset as i32, field_ty.data_type, field_ty.pos);
            offset += field_size;
        }
        self.eat(&Tok::RBrace)?;
        offset = (offset + alignment - 1) / alignment * alignment;

        let entry = self.table.user_type_mut(user_id);
        entry.size = offset;
        entry.alignment = alignment;
        entry.incomplete = false;
        Ok(())
    }

    fn parse_params(&mut self) -> Result<(Vec<(Rc<str>, Type)>, bool)> {
        let mut params = Vec::new();
        let mut variadic = false;
        self.eat(&Tok::LParen)?;
        if !matches!(self.peek(), Tok::RParen) {
            loop {
                if matches!(self.peek(), Tok::Ellipsis) {
                    self.bump();
                    variadic = true;
                    break;
                }
                let ty = self.parse_type_ref()?;
                let name = self.eat_ident()?;
                params.push((name, ty.data_type));
                if matches!(self.peek(), Tok::Comma) {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.eat(&Tok::RParen)?;
        Ok((params, variadic))
    }

    fn parse_func_decl(&mut self, attr: SymbolAttr, call_conv: CallConv) -> Result<()> {
        let pos = self.pos();
        self.eat(&Tok::Kw(Kw::Fn))?;
        let name = self.eat_ident()?;
        let (params, variadic) = self.parse_params()?;
        let return_type = if matches!(self.peek(), Tok::Semi | Tok::LBrace) { Type::void() } else { self.parse_type_ref()?.data_type };

        let global = self.table.global();
        let composite_return = return_type.size > 4;
        let mut arg_offset = 8;
        if composite_return {
            arg_offset += 4;
        }
        if call_conv == CallConv::Thiscall {
            arg_offset += 4;
        }
        let mut func_scope = Scope::new_function(global);
        func_scope.arg_offset = arg_offset;
        let func_scope_id = self.table.push_scope(func_scope);

        // Parameters are appended in reverse declaration order so that the
        // symbol table's simple incrementing offset matches this
        // compiler's left-to-right argument push order at call sites
        // (see `codegen::abi`): the last-declared parameter, pushed last,
        // sits closest to the saved return address.
        for (param_name, param_ty) in params.iter().rev() {
            self.table.scope_mut(func_scope_id).append_var(param_name.clone(), true, SymbolAttr::None, param_ty.clone(), pos);
        }

        let args: Vec<Type> = params.iter().map(|(_, t)| t.clone()).collect();
        let entry = FuncEntry {
            attr,
            return_type: return_type.clone(),
            args,
            variadic,
            call_conv,
            func_scope: func_scope_id,
            defined: matches!(self.peek(), Tok::LBrace),
            body: None,
        };
        self.table.scope_mut(global).append_func(name.clone(), entry, pos);

        if matches!(self.peek(), Tok::Semi) {
            self.bump();
            return Ok(());
        }

        let body = self.parse_block(func_scope_id)?;
        if let Some(SymbolEntry::Func(f)) = self.table.scope_mut(global).find_local_mut(&name) {
            f.body = Some(Rc::new(body));
        }
        Ok(())
    }

    fn parse_global_var_decl(&mut self, attr: SymbolAttr, stmts: &mut Vec<Stmt>) -> Result<()> {
        let pos = self.pos();
        let ty = self.parse_type_ref()?;
        let name = self.eat_ident()?;
        let global = self.table.global();

        if matches!(self.peek(), Tok::Eq) {
            self.bump();
            let value = self.parse_assign(global)?;
            self.eat(&Tok::Semi)?;
            match &value.kind {
                ExprKind::IntLit { .. } | ExprKind::StrLit(_) => {
                    self.table.scope_mut(global).append_global_var(name, attr, ty.data_type, Some(Rc::new(value)), pos);
                }
                _ => {
                    self.table.scope_mut(global).append_global_var(name.clone(), attr, ty.data_type, None, pos);
                    let target = ExprNode::new(pos, ExprKind::Var { ident: name, scope: global });
                    let assign = ExprNode::new(pos, ExprKind::Assign { target: Box::new(target), value: Box::new(value), from_decl: true });
                    stmts.push(Stmt { pos, kind: StmtKind::Expr(assign) });
                }
            }
        } else {
            self.eat(&Tok::Semi)?;
            self.table.scope_mut(global).append_global_var(name, attr, ty.data_type, None, pos);
        }
        Ok(())
    }

    fn parse_item(&mut self, stmts: &mut Vec<Stmt>) -> Result<()> {
        if self.at_kw(Kw::Type) {
            return self.parse_type_decl();
        }
        if matches!(self.peek(), Tok::Kw(Kw::Fn | Kw::Export | Kw::Extern | Kw::Cdecl | Kw::Stdcall | Kw::Thiscall)) {
            let (attr, call_conv) = self.parse_attrs();
            if self.at_kw(Kw::Fn) {
                return self.parse_func_decl(attr, call_conv);
            }
            return self.parse_global_var_decl(attr, stmts);
        }
        if self.is_type_start() {
            return self.parse_global_var_decl(SymbolAttr::None, stmts);
        }
        let global = self.table.global();
        let s = self.parse_stmt(global)?;
        stmts.push(s);
        Ok(())
    }
}

/// Parse a full translation unit: `toks` is consumed in full, every
/// declaration is entered into `table`, and the synthesized top-level
/// statement list (the implicit entry body) is returned.
pub fn parse_program(toks: &[Token], flat: &Flattened, table: &mut SymbolTable) -> Result<Stmt> {
    let mut p = Parser { toks, idx: 0, flat, table };
    let pos = p.pos();
    let mut stmts = Vec::new();
    while !matches!(p.peek(), Tok::Eof) {
        p.parse_item(&mut stmts)?;
    }
    Ok(Stmt { pos, kind: StmtKind::Stmts(stmts) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::preprocessor::preprocess_str;
    use crate::types::source::SourceState;

    fn parse(src: &str) -> (Stmt, SymbolTable) {
        let mut source = SourceState::new();
        let flat = preprocess_str(&mut source, "test.ika", src);
        let toks = tokenize(&flat).unwrap();
        let mut table = SymbolTable::new();
        let top = parse_program(&toks, &flat, &mut table).unwrap();
        (top, table)
    }

    #[test]
    fn parses_a_global_var_decl_with_literal_initializer() {
        let (_, table) = parse("i32 x = 42;\n");
        let global = table.global();
        let Some(SymbolEntry::Var(v)) = table.find(global, "x", true) else { panic!("expected var x") };
        assert!(v.init_val.is_some());
        assert_eq!(v.data_type, Type::primitive(Primitive::I32));
    }

    #[test]
    fn non_literal_global_initializer_becomes_a_runtime_assignment() {
        let (top, table) = parse("i32 x = 2 + 3 * 4;\n");
        let global = table.global();
        let Some(SymbolEntry::Var(v)) = table.find(global, "x", true) else { panic!("expected var x") };
        assert!(v.init_val.is_none());
        let StmtKind::Stmts(stmts) = &top.kind else { panic!("expected stmts") };
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0].kind, StmtKind::Expr(e) if matches!(e.kind, ExprKind::Assign { .. })));
    }

    #[test]
    fn parses_function_decl_with_params_and_recursive_call() {
        let (_, table) = parse("fn fact(i32 n) i32 { if (n < 2) { return 1; } return n * fact(n - 1); }\n");
        let global = table.global();
        let Some(SymbolEntry::Func(f)) = table.find(global, "fact", true) else { panic!("expected fn fact") };
        assert!(f.body.is_some());
        assert_eq!(f.args.len(), 1);
    }

    #[test]
    fn parses_struct_type_and_field_access() {
        let (_, table) = parse("type Point { i32 x; i32 y; }\nfn sum(Point p) i32 { return p.x + p.y; }\n");
        let global = table.global();
        let Some(SymbolEntry::Type(id)) = table.find(global, "Point", true) else { panic!("expected type Point") };
        let entry = table.user_type(*id);
        assert_eq!(entry.size, 8);
        assert_eq!(entry.alignment, 4);
    }

    #[test]
    fn parses_export_stdcall_attrs() {
        let (_, table) = parse("export stdcall fn main() i32 { return 0; }\n");
        let global = table.global();
        let Some(SymbolEntry::Func(f)) = table.find(global, "main", true) else { panic!("expected fn main") };
        assert_eq!(f.call_conv, CallConv::Stdcall);
        assert_eq!(f.attr, SymbolAttr::Export);
    }

    #[test]
    fn rejects_unterminated_block() {
        let mut source = SourceState::new();
        let flat = preprocess_str(&mut source, "test.ika", "fn f() { return 0;\n");
        let toks = tokenize(&flat).unwrap();
        let mut table = SymbolTable::new();
        assert!(parse_program(&toks, &flat, &mut table).is_err());
    }
}
