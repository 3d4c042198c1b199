// File: src/natives.rs
//
// Built-in native functions, registered into the global table at VM
// startup (spec §5). Natives only ever touch the heap, never the VM's
// stack or call frames directly — see `NativeFn`'s signature in value.rs.

use crate::gc::Heap;
use crate::value::{ObjData, Value};

/// Seconds elapsed since process start, as a float. Used for crude
/// benchmarking from within scripts.
pub fn clock_native(heap: &mut Heap, _args: &[Value]) -> Result<Value, String> {
    Ok(Value::Number(heap.uptime_secs()))
}

/// `deleteField(instance, name)` — removes a field from an instance's
/// table, if present. Returns `nil` either way.
pub fn delete_field_native(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    let instance_ref = match args[0] {
        Value::Obj(r) if matches!(heap.data(r), ObjData::Instance(_)) => r,
        _ => return Err("deleteField() expects an instance as its first argument.".to_string()),
    };
    let name_ref = match args[1] {
        Value::Obj(r) if matches!(heap.data(r), ObjData::Str(_)) => r,
        _ => return Err("deleteField() expects a string as its second argument.".to_string()),
    };
    let hash = heap.hash_of_str(name_ref);
    heap.as_instance_mut(instance_ref).fields.delete(name_ref, hash);
    Ok(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_returns_elapsed_seconds_since_heap_creation() {
        let mut heap = Heap::new(false);
        let result = clock_native(&mut heap, &[]).unwrap();
        assert!(matches!(result, Value::Number(n) if n >= 0.0));
    }

    #[test]
    fn delete_field_removes_an_existing_field() {
        let mut heap = Heap::new(false);
        let class_name = heap.intern("Point");
        let class_ref = heap.alloc_class(class_name);
        let instance_ref = heap.alloc_instance(class_ref);
        let field_name = heap.intern("x");
        let hash = heap.hash_of_str(field_name);
        heap.as_instance_mut(instance_ref).fields.set(field_name, hash, Value::Number(1.0));

        let args = [Value::Obj(instance_ref), Value::Obj(field_name)];
        assert!(delete_field_native(&mut heap, &args).is_ok());
        assert!(heap.as_instance(instance_ref).fields.get(field_name, hash).is_none());
    }
}
