use crate::shader::{UniformBlock, UniformKind, UniformLocation};

/// CPU copy of a program's std140 uniform block.
///
/// Setters resolve the member by name on every call. A name the block does not
/// declare, or a value of the wrong type, is ignored.
#[derive(Clone, Debug)]
pub(crate) struct UniformStaging {
    block: Option<UniformBlock>,
    bytes: Vec<u8>,
}

impl UniformStaging {
    pub fn new(block: Option<UniformBlock>) -> Self {
        let size = block.as_ref().map_or(0, |block| block.size as usize);
        Self {
            block,
            bytes: vec![0; size],
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.block.as_ref()?.location(name)
    }

    pub fn set_int(&mut self, name: &str, value: i32) {
        self.write(name, UniformKind::Int, bytemuck::bytes_of(&value));
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.write(name, UniformKind::Float, bytemuck::bytes_of(&value));
    }

    pub fn set_vec3(&mut self, name: &str, value: [f32; 3]) {
        self.write(name, UniformKind::Vec3, bytemuck::cast_slice(&value));
    }

    pub fn set_vec4(&mut self, name: &str, value: [f32; 4]) {
        self.write(name, UniformKind::Vec4, bytemuck::cast_slice(&value));
    }

    /// Column-major, as GLSL expects.
    pub fn set_mat4(&mut self, name: &str, columns: &[[f32; 4]; 4]) {
        self.write(name, UniformKind::Mat4, bytemuck::cast_slice(columns));
    }

    /// Column-major; std140 pads each column to a vec4.
    pub fn set_mat3(&mut self, name: &str, columns: &[[f32; 3]; 3]) {
        let mut padded = [[0.0f32; 4]; 3];
        for (dst, src) in padded.iter_mut().zip(columns) {
            dst[..3].copy_from_slice(src);
        }
        self.write(name, UniformKind::Mat3, bytemuck::cast_slice(&padded));
    }

    fn write(&mut self, name: &str, expected: UniformKind, value: &[u8]) {
        let Some(location) = self.uniform_location(name) else {
            tracing::trace!(name, "uniform not declared by program; ignoring");
            return;
        };
        if location.kind != expected {
            tracing::trace!(
                name,
                declared = ?location.kind,
                written = ?expected,
                "uniform type mismatch; ignoring"
            );
            return;
        }
        let start = location.offset as usize;
        match self.bytes.get_mut(start..start + value.len()) {
            Some(slot) => slot.copy_from_slice(value),
            None => tracing::trace!(name, "uniform write past end of block; ignoring"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{build_program, StageSources, UniformField};

    fn filter_block() -> UniformBlock {
        let sources = StageSources {
            vertex: include_str!("../../../../assets/shaders/filter.vert").to_owned(),
            fragment: include_str!("../../../../assets/shaders/filter.frag").to_owned(),
        };
        build_program(&sources)
            .expect("bundled shaders link")
            .interface()
            .uniform_block
            .clone()
            .expect("bundled shaders declare a uniform block")
    }

    fn read_i32(bytes: &[u8], offset: usize) -> i32 {
        i32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn writes_land_at_reflected_offsets() {
        let mut staging = UniformStaging::new(Some(filter_block()));
        staging.set_vec4("uRect", [1.0, 2.0, 3.0, 4.0]);
        staging.set_int("uMode", 2);
        staging.set_int("uRadius", 5);

        let bytes = staging.bytes();
        assert_eq!(read_f32(bytes, 0), 1.0);
        assert_eq!(read_f32(bytes, 12), 4.0);
        assert_eq!(read_i32(bytes, 32), 2);
        assert_eq!(read_i32(bytes, 36), 5);
    }

    #[test]
    fn unknown_name_is_silent_no_op() {
        let mut staging = UniformStaging::new(Some(filter_block()));
        let before = staging.bytes().to_vec();
        staging.set_float("uMissing", 3.0);
        assert_eq!(staging.bytes(), before.as_slice());
    }

    #[test]
    fn mismatched_type_is_ignored() {
        let mut staging = UniformStaging::new(Some(filter_block()));
        staging.set_float("uMode", 7.0);
        assert_eq!(read_i32(staging.bytes(), 32), 0);
    }

    #[test]
    fn program_without_block_accepts_writes() {
        let mut staging = UniformStaging::new(None);
        staging.set_int("uMode", 1);
        assert!(staging.bytes().is_empty());
    }

    #[test]
    fn mat3_columns_are_padded() {
        let block = UniformBlock {
            binding: 0,
            size: 48,
            fields: vec![UniformField {
                name: "uBasis".to_owned(),
                offset: 0,
                kind: UniformKind::Mat3,
            }],
        };
        let mut staging = UniformStaging::new(Some(block));
        staging.set_mat3("uBasis", &[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);

        let bytes = staging.bytes();
        assert_eq!(read_f32(bytes, 16), 4.0);
        assert_eq!(read_f32(bytes, 12), 0.0);
        assert_eq!(read_f32(bytes, 40), 9.0);
    }
}
