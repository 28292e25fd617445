//! Per-statement and per-expression emission: address-vs-value
//! discipline, binary/unary operators (including `&&`/`||`), assignment,
//! control flow, and every expression form that isn't calling-convention
//! specific (`codegen::abi` owns the receiver/hidden-pointer half of
//! calls and returns).
//!
//! Grounded on `original_source/src/codegen.c`'s `emit_node` dispatch and
//! its per-node-kind `emit_*` helpers. One deliberate departure: the
//! original re-evaluates the right-hand operand of `&&`/`||` a second
//! time inside the short-circuit branch after already having evaluated it
//! once, unconditionally, to set up the generic binary-op machinery —
//! which runs the right operand's side effects even when it should have
//! been skipped. This evaluates it at most once.

use std::rc::Rc;

use super::abi;
use super::CodegenState;
use crate::error::{Error, Result};
use crate::symbol::{SymbolEntry, SymbolTable};
use crate::types::ast::{BinOp, ExprKind, ExprNode, LoopCtl, Stmt, StmtKind, UnOp};
use crate::types::ty::{CallConv, Primitive, Type, TypeKind, PTR_SIZE};

use abi::pad4;

/// `emit_load_address`: dereference a size-appropriate value out of the
/// address currently in `%eax`. A no-op for composite types (any size
/// outside `{1,2,3,4}`), which are never loaded into a register.
fn emit_load_address(st: &mut CodegenState, ty: &Type) {
    match ty.size {
        4 => st.instr("movl (%eax), %eax"),
        3 => {
            st.instr("movl %eax, %ecx");
            st.instr("movzwl (%ecx), %eax");
            st.instr("movb 2(%ecx), %ah");
        }
        2 => {
            if ty.as_primitive() == Some(Primitive::I16) {
                st.instr("movswl (%eax), %eax");
            } else {
                st.instr("movzwl (%eax), %eax");
            }
        }
        1 => {
            if ty.as_primitive() == Some(Primitive::I8) {
                st.instr("movsbl (%eax), %eax");
            } else {
                st.instr("movzbl (%eax), %eax");
            }
        }
        _ => {}
    }
}

fn load_if_address(st: &mut CodegenState, ty: &Type, is_address: bool) {
    if is_address {
        emit_load_address(st, ty);
    }
}

/// Push the address an operand refers to: a bare register already holds
/// the address and is pushed as-is, while an offset form (`"4(%eax)"`)
/// names a memory location and must be `leal`'d into a scratch register
/// first so the *address*, not the value stored there, ends up on the
/// stack.
fn push_address_operand(st: &mut CodegenState, operand: &str) {
    if operand.starts_with('%') && !operand.contains('(') {
        st.instr(&format!("pushl {operand}"));
    } else {
        st.instr(&format!("leal {operand}, %edx"));
        st.instr("pushl %edx");
    }
}

/// Copy `size` bytes from `src` to `dest`, both already-formatted
/// addressing-mode operands (e.g. `"%ecx"`, `"4(%eax)"`); neither may be
/// `%edx`, `%esi`, `%edi`, or `%esp`. When `st.inline_memcpy` is unset,
/// this always calls out to an external `memcpy`, matching the
/// original's `NO_MEMCPY`-undefined build; otherwise small copies unroll
/// into `movl`/`movw`/`movb` and larger ones use `rep movsb`.
fn emit_memcpy(st: &mut CodegenState, dest: &str, src: &str, size: u32) {
    if !st.inline_memcpy {
        let prefix = st.target.symbol_prefix();
        st.instr(&format!("pushl ${size}"));
        push_address_operand(st, src);
        push_address_operand(st, dest);
        st.instr(&format!("call {prefix}memcpy"));
        st.instr("addl $12, %esp");
        return;
    }
    if size <= st.inline_memcpy_threshold {
        let mut offset = 0u32;
        while offset < size {
            let remaining = size - offset;
            if remaining >= 4 {
                st.instr(&format!("movl {offset}({src}), %edx"));
                st.instr(&format!("movl %edx, {offset}({dest})"));
                offset += 4;
            } else if remaining >= 2 {
                st.instr(&format!("movw {offset}({src}), %dx"));
                st.instr(&format!("movw %dx, {offset}({dest})"));
                offset += 2;
                if size - offset == 1 {
                    st.instr(&format!("movb {offset}({src}), %dl"));
                    st.instr(&format!("movb %dl, {offset}({dest})"));
                    offset += 1;
                }
            } else {
                st.instr(&format!("movb {offset}({src}), %dl"));
                st.instr(&format!("movb %dl, {offset}({dest})"));
                offset += 1;
            }
        }
    } else {
        st.instr("push %esi");
        st.instr("push %edi");
        st.instr("push %ecx");
        st.instr(&format!("movl {src}, %esi"));
        st.instr(&format!("movl {dest}, %edi"));
        st.instr(&format!("movl ${size}, %ecx"));
        st.instr("cld");
        st.instr("rep movsb");
        st.instr("pop %ecx");
        st.instr("pop %edi");
        st.instr("pop %esi");
    }
}

fn emit_add_sub(st: &mut CodegenState, op: BinOp, l_type: &Type, r_type: &Type) -> Result<()> {
    if l_type.is_array_ptr() || r_type.is_array_ptr() {
        let l_ptr = l_type.is_array_ptr();
        let p_type = if l_ptr { l_type } else { r_type };
        let inner = p_type.inner().ok_or_else(|| Error::internal("pointer arithmetic on a type with no element type"))?;
        let size = if inner.is_void() { 1 } else { inner.size };
        if size != 1 {
            let reg = if l_ptr { "%ecx" } else { "%eax" };
            st.instr(&format!("imull ${size}, {reg}"));
        }
    }
    match op {
        BinOp::Add => st.instr("addl %ecx, %eax"),
        BinOp::Sub => st.instr("subl %ecx, %eax"),
        _ => unreachable!("emit_add_sub called with a non add/sub operator"),
    }
    Ok(())
}

fn emit_relational(st: &mut CodegenState, op: BinOp) {
    st.instr("cmpl %ecx, %eax");
    match op {
        BinOp::Eq => st.instr("sete %al"),
        BinOp::Ne => st.instr("setne %al"),
        BinOp::Lt => st.instr("setl %al"),
        BinOp::Le => st.instr("setle %al"),
        BinOp::Gt => st.instr("setg %al"),
        BinOp::Ge => st.instr("setge %al"),
        _ => unreachable!("emit_relational called with a non-relational operator"),
    }
    st.instr("movzbl %al, %eax");
}

fn emit_arith(st: &mut CodegenState, op: BinOp, l_type: &Type, r_type: &Type) -> Result<()> {
    let l_prim = l_type.as_primitive().ok_or_else(|| Error::internal("arithmetic operator on a non-integer type"))?;
    let r_prim = r_type.as_primitive().ok_or_else(|| Error::internal("arithmetic operator on a non-integer type"))?;
    let signed = crate::types::ty::implicit_promote(l_prim, r_prim).is_signed();
    match op {
        BinOp::Mul => st.instr("imull %ecx, %eax"),
        BinOp::Div => {
            if signed {
                st.instr("cdq");
                st.instr("idivl %ecx");
            } else {
                st.instr("xor %edx, %edx");
                st.instr("divl %ecx");
            }
        }
        BinOp::Mod => {
            if signed {
                st.instr("cdq");
                st.instr("idivl %ecx");
            } else {
                st.instr("xor %edx, %edx");
                st.instr("divl %ecx");
            }
            st.instr("movl %edx, %eax");
        }
        BinOp::Shl => {
            st.instr("movl %ecx, %edx");
            st.instr("shll %cl, %eax");
        }
        BinOp::Shr => {
            st.instr("movl %ecx, %edx");
            if signed {
                st.instr("sarl %cl, %eax");
            } else {
                st.instr("shrl %cl, %eax");
            }
        }
        BinOp::And => st.instr("andl %ecx, %eax"),
        BinOp::Xor => st.instr("xorl %ecx, %eax"),
        BinOp::Or => st.instr("orl %ecx, %eax"),
        _ => unreachable!("emit_arith called with an operator handled elsewhere"),
    }
    Ok(())
}

fn emit_binop(st: &mut CodegenState, table: &SymbolTable, op: BinOp, left: &ExprNode, right: &ExprNode) -> Result<bool> {
    let l_is_addr = emit_expr(st, table, left)?;
    if op == BinOp::Comma {
        return emit_expr(st, table, right);
    }

    let l_type = left.type_info().ty().clone();
    load_if_address(st, &l_type, l_is_addr);

    if l_type.is_bool() && matches!(op, BinOp::LAnd | BinOp::LOr) {
        let end = st.new_label();
        st.instr("testl %eax, %eax");
        match op {
            BinOp::LOr => st.instr(&format!("jnz {end}")),
            BinOp::LAnd => st.instr(&format!("jz {end}")),
            _ => unreachable!(),
        }
        let r_is_addr = emit_expr(st, table, right)?;
        let r_type = right.type_info().ty().clone();
        load_if_address(st, &r_type, r_is_addr);
        st.label(&end);
        return Ok(false);
    }

    st.instr("pushl %eax");
    let r_is_addr = emit_expr(st, table, right)?;
    let r_type = right.type_info().ty().clone();
    load_if_address(st, &r_type, r_is_addr);
    st.instr("movl %eax, %ecx");
    st.instr("popl %eax");

    if l_type.is_bool() {
        match op {
            BinOp::Eq | BinOp::Ne => emit_relational(st, op),
            _ => return Err(Error::internal("non-comparison binary operator applied to bool operands")),
        }
        return Ok(false);
    }

    match op {
        BinOp::Add | BinOp::Sub => emit_add_sub(st, op, &l_type, &r_type)?,
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => emit_relational(st, op),
        BinOp::Mul | BinOp::Div | BinOp::Mod | BinOp::Shl | BinOp::Shr | BinOp::And | BinOp::Xor | BinOp::Or => {
            emit_arith(st, op, &l_type, &r_type)?;
        }
        BinOp::LAnd | BinOp::LOr => return Err(Error::internal("&&/|| require bool operands")),
        BinOp::Comma => unreachable!("comma handled above"),
    }
    Ok(false)
}

fn emit_unaryop(st: &mut CodegenState, table: &SymbolTable, op: UnOp, operand: &ExprNode) -> Result<bool> {
    let is_addr = emit_expr(st, table, operand)?;
    let ty = operand.type_info().ty().clone();
    match op {
        UnOp::Plus => {
            load_if_address(st, &ty, is_addr);
            Ok(false)
        }
        UnOp::Neg => {
            load_if_address(st, &ty, is_addr);
            st.instr("negl %eax");
            Ok(false)
        }
        UnOp::BitNot => {
            load_if_address(st, &ty, is_addr);
            st.instr("notl %eax");
            Ok(false)
        }
        UnOp::Not => {
            load_if_address(st, &ty, is_addr);
            st.instr("testl %eax, %eax");
            st.instr("sete %al");
            st.instr("movzbl %al, %eax");
            Ok(false)
        }
        UnOp::Deref => {
            load_if_address(st, &ty, is_addr);
            Ok(true)
        }
        // `&x`: `x` is already an lvalue address sitting in %eax; leave it
        // there as the resulting pointer *value*, undereferenced.
        UnOp::AddrOf => Ok(false),
    }
}

fn emit_var(st: &mut CodegenState, table: &SymbolTable, ident: &str, scope: crate::symbol::ScopeId) -> Result<bool> {
    let entry = table.find(scope, ident, false).ok_or_else(|| Error::internal(format!("unresolved identifier '{ident}' reached codegen")))?;
    match entry {
        SymbolEntry::Var(v) if v.is_global => {
            let prefix = st.target.symbol_prefix();
            st.instr(&format!("movl ${prefix}{ident}, %eax"));
            Ok(true)
        }
        SymbolEntry::Var(v) if v.is_arg => {
            st.instr(&format!("leal {}(%ebp), %eax", v.offset + v.arg_base));
            Ok(true)
        }
        SymbolEntry::Var(v) => {
            st.instr(&format!("leal -{}(%ebp), %eax", v.offset));
            Ok(true)
        }
        SymbolEntry::Func(f) => {
            let mangled = abi::mangled_func_name(st, ident, f);
            st.instr(&format!("movl ${mangled}, %eax"));
            Ok(false)
        }
        SymbolEntry::Field(_) | SymbolEntry::Define(_) | SymbolEntry::Type(_) => {
            Err(Error::internal(format!("'{ident}' does not resolve to a variable or function")))
        }
    }
}

fn emit_field(st: &mut CodegenState, table: &SymbolTable, base: &ExprNode, ident: &str) -> Result<bool> {
    let base_is_addr = emit_expr(st, table, base)?;
    let base_ty = base.type_info().ty().clone();
    let struct_ty = if matches!(&base_ty.kind, TypeKind::Pointer { level: 1, .. }) {
        load_if_address(st, &base_ty, base_is_addr);
        base_ty.deref_once()
    } else {
        base_ty
    };
    let user_id = struct_ty.as_user().ok_or_else(|| Error::internal("field access on a non-struct type"))?;
    let field_scope = table.user_type(user_id).field_scope;
    let entry = table.find(field_scope, ident, true).ok_or_else(|| Error::internal(format!("unknown field '{ident}'")))?;
    let SymbolEntry::Field(field) = entry else {
        return Err(Error::internal(format!("'{ident}' does not name a field")));
    };
    st.instr(&format!("leal {}(%eax), %eax", field.offset));
    Ok(true)
}

fn emit_indexof(st: &mut CodegenState, table: &SymbolTable, base: &ExprNode, index: &ExprNode) -> Result<bool> {
    let base_is_addr = emit_expr(st, table, base)?;
    let base_ty = base.type_info().ty().clone();
    // A sized array's own address already serves as the base pointer for
    // indexing; only pointers and decaying unsized arrays need a load.
    let is_sized_array = matches!(&base_ty.kind, TypeKind::Array { size, .. } if *size > 0);
    if base_is_addr && !is_sized_array {
        load_if_address(st, &base_ty, true);
    }

    st.instr("pushl %eax");
    let idx_is_addr = emit_expr(st, table, index)?;
    let idx_ty = index.type_info().ty().clone();
    load_if_address(st, &idx_ty, idx_is_addr);
    st.instr("popl %ecx");

    let elem_size = base_ty.inner().ok_or_else(|| Error::internal("indexing a non-array/pointer type"))?.size;
    st.instr(&format!("imull ${elem_size}, %eax"));
    st.instr("addl %ecx, %eax");
    Ok(true)
}

fn emit_cast(st: &mut CodegenState, table: &SymbolTable, expr: &ExprNode) -> Result<bool> {
    let is_addr = emit_expr(st, table, expr)?;
    let ty = expr.type_info().ty().clone();
    load_if_address(st, &ty, is_addr);
    Ok(false)
}

fn emit_assign(st: &mut CodegenState, table: &SymbolTable, target: &ExprNode, value: &ExprNode) -> Result<bool> {
    let target_is_addr = emit_expr(st, table, target)?;
    debug_assert!(target_is_addr, "assignment target must resolve to an address");
    let target_ty = target.type_info().ty().clone();

    st.instr("pushl %eax");
    let value_is_addr = emit_expr(st, table, value)?;
    let value_ty = value.type_info().ty().clone();
    load_if_address(st, &value_ty, value_is_addr);
    st.instr("popl %ecx");

    match target_ty.size {
        4 => st.instr("movl %eax, (%ecx)"),
        3 => {
            st.instr("movw %ax, (%ecx)");
            st.instr("movb %ah, 2(%ecx)");
        }
        2 => st.instr("movw %ax, (%ecx)"),
        1 => st.instr("movb %al, (%ecx)"),
        _ => emit_memcpy(st, "%ecx", "%eax", target_ty.size),
    }
    st.instr("movl %ecx, %eax");
    Ok(true)
}

fn emit_call(st: &mut CodegenState, table: &SymbolTable, callee: &ExprNode, args: &[ExprNode]) -> Result<bool> {
    let callee_ty = callee.type_info().ty().clone();
    let sig = callee_ty.as_function().ok_or_else(|| Error::internal("call target is not a function type"))?.clone();
    let composite_return = sig.return_type.size > PTR_SIZE;

    let (receiver, rest) = abi::split_receiver(sig.call_conv, args);

    let mut args_size = 0u32;
    for arg in rest {
        let is_addr = emit_expr(st, table, arg)?;
        let arg_ty = arg.type_info().ty().clone();
        load_if_address(st, &arg_ty, is_addr);
        let size = pad4(arg_ty.size);
        if size <= PTR_SIZE {
            st.instr("pushl %eax");
        } else {
            st.instr(&format!("subl ${size}, %esp"));
            st.instr("movl %esp, %ecx");
            emit_memcpy(st, "%ecx", "%eax", size);
        }
        args_size += size;
    }

    if composite_return {
        st.instr(&format!("leal -{}(%ebp), %eax", st.temp_struct_stack_offset));
        st.instr("pushl %eax");
        args_size += PTR_SIZE;
    }

    if let Some(receiver) = receiver {
        let is_addr = emit_expr(st, table, receiver)?;
        let r_ty = receiver.type_info().ty().clone();
        load_if_address(st, &r_ty, is_addr);
        st.instr("movl %eax, %ecx");
    }

    let callee_is_addr = emit_expr(st, table, callee)?;
    load_if_address(st, &callee_ty, callee_is_addr);

    st.instr("call *%eax");

    if sig.call_conv == CallConv::Cdecl && args_size > 0 {
        st.instr(&format!("addl ${args_size}, %esp"));
    }

    if sig.return_type.is_void() || composite_return {
        return Ok(composite_return);
    }
    match sig.return_type.size {
        2 => {
            if sig.return_type.as_primitive() == Some(Primitive::I16) {
                st.instr("movswl %ax, %eax");
            } else {
                st.instr("movzwl %ax, %eax");
            }
        }
        1 => {
            if sig.return_type.as_primitive() == Some(Primitive::I8) {
                st.instr("movsbl %al, %eax");
            } else {
                st.instr("movzbl %al, %eax");
            }
        }
        _ => {}
    }
    Ok(false)
}

fn emit_print(st: &mut CodegenState, table: &SymbolTable, fmt: &Rc<str>, args: &[ExprNode]) -> Result<()> {
    let mut count = 0u32;
    for arg in args {
        let is_addr = emit_expr(st, table, arg)?;
        let ty = arg.type_info().ty().clone();
        load_if_address(st, &ty, is_addr);
        st.instr("pushl %eax");
        count += 1;
    }

    let label = st.intern_string(fmt);
    st.instr(&format!("pushl ${label}"));
    count += 1;

    let prefix = st.target.symbol_prefix();
    st.instr(&format!("call {prefix}printf"));
    st.instr(&format!("addl ${}, %esp", count * PTR_SIZE));
    Ok(())
}

fn emit_return(st: &mut CodegenState, table: &SymbolTable, expr: &Option<ExprNode>) -> Result<()> {
    if let Some(expr) = expr {
        let is_addr = emit_expr(st, table, expr)?;
        let ty = expr.type_info().ty().clone();
        load_if_address(st, &ty, is_addr);
        if ty.size > PTR_SIZE {
            let offset = st.hidden_ptr_offset;
            st.instr(&format!("movl {offset}(%ebp), %ecx"));
            emit_memcpy(st, "%ecx", "%eax", ty.size);
            st.instr(&format!("movl {offset}(%ebp), %eax"));
        }
    }
    let label = st.return_label.clone().expect("return statement reached outside a function body");
    st.instr(&format!("jmp {label}"));
    Ok(())
}

fn emit_if(st: &mut CodegenState, table: &SymbolTable, cond: &ExprNode, then_block: &Stmt, else_block: Option<&Stmt>) -> Result<()> {
    let end = st.new_label();
    let else_label = st.new_label();

    let is_addr = emit_expr(st, table, cond)?;
    let ty = cond.type_info().ty().clone();
    load_if_address(st, &ty, is_addr);
    st.instr("testl %eax, %eax");
    st.instr(&format!("jz {else_label}"));

    emit_stmt(st, table, then_block)?;
    st.instr(&format!("jmp {end}"));
    st.label(&else_label);
    if let Some(else_block) = else_block {
        emit_stmt(st, table, else_block)?;
    }
    st.label(&end);
    Ok(())
}

fn emit_while(st: &mut CodegenState, table: &SymbolTable, cond: &ExprNode, post: &Option<ExprNode>, body: &Stmt) -> Result<()> {
    let loop_label = st.new_label();
    let inc_label = st.new_label();
    let end_label = st.new_label();

    st.label(&loop_label);
    let is_addr = emit_expr(st, table, cond)?;
    let ty = cond.type_info().ty().clone();
    load_if_address(st, &ty, is_addr);
    st.instr("testl %eax, %eax");
    st.instr(&format!("jz {end_label}"));

    st.loop_labels.push((end_label.clone(), inc_label.clone()));
    let body_result = emit_stmt(st, table, body);
    st.loop_labels.pop();
    body_result?;

    st.label(&inc_label);
    if let Some(post) = post {
        let p_is_addr = emit_expr(st, table, post)?;
        let p_ty = post.type_info().ty().clone();
        load_if_address(st, &p_ty, p_is_addr);
    }
    st.instr(&format!("jmp {loop_label}"));
    st.label(&end_label);
    Ok(())
}

fn emit_goto(st: &mut CodegenState, ctl: LoopCtl) -> Result<()> {
    let (break_label, continue_label) = st
        .loop_labels
        .last()
        .cloned()
        .ok_or_else(|| Error::internal("break/continue outside a loop reached codegen"))?;
    match ctl {
        LoopCtl::Break => st.instr(&format!("jmp {break_label}")),
        LoopCtl::Continue => st.instr(&format!("jmp {continue_label}")),
    }
    Ok(())
}

pub(super) fn emit_stmt(st: &mut CodegenState, table: &SymbolTable, stmt: &Stmt) -> Result<()> {
    match &stmt.kind {
        StmtKind::Stmts(stmts) => {
            for s in stmts {
                emit_stmt(st, table, s)?;
            }
            Ok(())
        }
        StmtKind::Expr(expr) => {
            emit_expr(st, table, expr)?;
            Ok(())
        }
        StmtKind::Print { fmt, args } => emit_print(st, table, fmt, args),
        StmtKind::Return(expr) => emit_return(st, table, expr),
        StmtKind::If { cond, then_block, else_block } => emit_if(st, table, cond, then_block, else_block.as_deref()),
        StmtKind::While { cond, post, body } => emit_while(st, table, cond, post, body),
        StmtKind::Goto(ctl) => emit_goto(st, *ctl),
        StmtKind::Asm(text) => {
            for line in text.lines() {
                let line = line.trim();
                if !line.is_empty() {
                    st.instr(line);
                }
            }
            Ok(())
        }
    }
}

/// Emit one expression, returning whether `%eax` now holds the *address*
/// of the expression's value (as opposed to the value itself) — a
/// codegen-local fact recomputed here rather than stored on the node.
pub(super) fn emit_expr(st: &mut CodegenState, table: &SymbolTable, node: &ExprNode) -> Result<bool> {
    match &node.kind {
        ExprKind::IntLit { val, .. } => {
            st.instr(&format!("movl ${val}, %eax"));
            Ok(false)
        }
        ExprKind::StrLit(s) => {
            let label = st.intern_string(s);
            st.instr(&format!("movl ${label}, %eax"));
            Ok(false)
        }
        ExprKind::Binary { op, left, right } => emit_binop(st, table, *op, left, right),
        ExprKind::Unary { op, operand } => emit_unaryop(st, table, *op, operand),
        ExprKind::Var { ident, scope } => emit_var(st, table, ident, *scope),
        ExprKind::Call { callee, args } => emit_call(st, table, callee, args),
        ExprKind::Index { base, index } => emit_indexof(st, table, base, index),
        ExprKind::Field { base, ident } => emit_field(st, table, base, ident),
        ExprKind::Cast { expr, .. } => emit_cast(st, table, expr),
        ExprKind::Assign { target, value, .. } => emit_assign(st, table, target, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::TargetOs;
    use crate::symbol::SymbolTable;
    use crate::types::ast::TypeInfo;
    use crate::types::source::{FileId, SourcePos};
    use crate::types::ty::Primitive;

    fn pos() -> SourcePos {
        SourcePos::new(FileId(0), 1, 1)
    }

    fn typed(kind: ExprKind, ty: Type) -> ExprNode {
        let node = ExprNode::new(pos(), kind);
        node.set_type_info(TypeInfo { ty: Some(ty), is_lvalue: false });
        node
    }

    fn int_lit(val: i64) -> ExprNode {
        typed(ExprKind::IntLit { val, data_type: Primitive::I32 }, Type::primitive(Primitive::I32))
    }

    fn new_state() -> CodegenState {
        CodegenState::new(TargetOs::Linux)
    }

    #[test]
    fn int_literal_moves_its_value_into_eax_and_is_not_an_address() {
        let mut st = new_state();
        let table = SymbolTable::new();
        let is_addr = emit_expr(&mut st, &table, &int_lit(7)).unwrap();
        assert!(!is_addr);
        assert!(st.out.contains("movl $7, %eax"));
    }

    #[test]
    fn pointer_addition_scales_the_integer_operand_by_element_size() {
        let mut st = new_state();
        let table = SymbolTable::new();
        // Sema only ever types a pointer-arithmetic operand as an unsized
        // array (`is_array_ptr`), never a bare `Pointer`, so that's what
        // reaches codegen for a well-typed `+`/`-`.
        let ptr_ty = Type::array(Type::primitive(Primitive::I32), 0);
        let left = typed(ExprKind::IntLit { val: 0, data_type: Primitive::I32 }, ptr_ty);
        let right = int_lit(3);
        let is_addr = emit_binop(&mut st, &table, BinOp::Add, &left, &right).unwrap();
        assert!(!is_addr);
        assert!(st.out.contains("imull $4, %ecx"));
        assert!(st.out.contains("addl %ecx, %eax"));
    }

    #[test]
    fn logical_or_short_circuits_without_reevaluating_the_right_operand() {
        let mut st = new_state();
        let table = SymbolTable::new();
        let left = typed(ExprKind::IntLit { val: 1, data_type: Primitive::I32 }, Type::primitive(Primitive::Bool));
        let right = typed(ExprKind::IntLit { val: 99, data_type: Primitive::I32 }, Type::primitive(Primitive::Bool));
        emit_binop(&mut st, &table, BinOp::LOr, &left, &right).unwrap();
        assert_eq!(st.out.matches("movl $99, %eax").count(), 1);
        assert!(st.out.contains("jnz"));
    }

    #[test]
    fn bool_equality_compares_without_a_second_load() {
        let mut st = new_state();
        let table = SymbolTable::new();
        let left = typed(ExprKind::IntLit { val: 1, data_type: Primitive::I32 }, Type::primitive(Primitive::Bool));
        let right = typed(ExprKind::IntLit { val: 0, data_type: Primitive::I32 }, Type::primitive(Primitive::Bool));
        emit_binop(&mut st, &table, BinOp::Eq, &left, &right).unwrap();
        assert!(st.out.contains("sete %al"));
    }

    #[test]
    fn small_memcpy_unrolls_into_plain_moves() {
        let mut st = new_state();
        emit_memcpy(&mut st, "%ecx", "%eax", 5);
        assert!(st.out.contains("movl 0(%eax), %edx"));
        assert!(st.out.contains("movb 4(%eax), %dl"));
        assert!(!st.out.contains("rep movsb"));
    }

    #[test]
    fn large_memcpy_falls_back_to_rep_movsb() {
        let mut st = new_state();
        emit_memcpy(&mut st, "%ecx", "%eax", 64);
        assert!(st.out.contains("rep movsb"));
    }

    #[test]
    fn disabling_inline_memcpy_calls_out_regardless_of_size() {
        let mut st = new_state();
        st.inline_memcpy = false;
        emit_memcpy(&mut st, "%ecx", "%eax", 5);
        assert!(st.out.contains("call memcpy"));
        assert!(!st.out.contains("rep movsb"));
        assert!(!st.out.contains("movl 0(%eax)"));
    }

    #[test]
    fn unary_not_negates_truthiness() {
        let mut st = new_state();
        let table = SymbolTable::new();
        let operand = int_lit(0);
        emit_unaryop(&mut st, &table, UnOp::Not, &operand).unwrap();
        assert!(st.out.contains("sete %al"));
    }
}
