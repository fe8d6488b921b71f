#[allow(dead_code)]
#[derive(calmform::form::FormModel)]
enum EnumForm {
    Empty,
}

fn main() {}
